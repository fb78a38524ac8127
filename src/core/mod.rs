pub mod invitations;
pub mod organization;
