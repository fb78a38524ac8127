use crate::config::DatabaseConfig;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub fn create_conn(config: &DatabaseConfig) -> anyhow::Result<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(config.url.clone());
    Pool::builder()
        .max_size(config.max_connections)
        .build(manager)
        .map_err(Into::into)
}

/// Run a closure against a pooled connection on the blocking thread pool.
/// Errors are flattened to strings for the handler layer.
pub async fn with_db<T, F>(pool: &DbPool, f: F) -> Result<T, String>
where
    F: FnOnce(&mut PgConnection) -> Result<T, diesel::result::Error> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| format!("DB connection error: {e}"))?;
        f(&mut conn).map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| format!("Blocking task failed: {e}"))?
}

pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators_and_symbols() {
        assert_eq!(slugify("Acme  Recruiting!"), "acme-recruiting");
        assert_eq!(slugify("Q1_Hiring - EMEA"), "q1-hiring-emea");
    }
}
