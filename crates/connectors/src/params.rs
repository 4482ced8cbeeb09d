use std::fmt;

/// Everything needed to open one warehouse session.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Applied with `SET SESSION RESOURCE_POOL` right after connecting.
    pub resource_pool: Option<String>,
}

impl ConnectionParams {
    pub fn endpoint(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("resource_pool", &self.resource_pool)
            .finish()
    }
}
