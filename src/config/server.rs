/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to (e.g., "127.0.0.1")
    pub host: String,

    /// Port number to bind to (e.g., 8080)
    pub port: u16,
}

impl ServerConfig {
    /// Validate server configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("SERVER_HOST cannot be empty".to_string());
        }

        if self.port == 0 {
            return Err("SERVER_PORT must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Address string suitable for `TcpListener::bind`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
