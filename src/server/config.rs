//! Server configuration

use super::client::DEFAULT_QUEUE_LIMIT;
use crate::security::AuthPolicy;

/// Screen geometry advertised in the setup reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenConfig {
    pub width: u16,
    pub height: u16,
    pub width_mm: u16,
    pub height_mm: u16,
}

impl ScreenConfig {
    /// Pixel size with a physical size derived at 96 dpi
    pub fn with_size(width: u16, height: u16) -> Self {
        let mm = |px: u16| ((px as u32 * 254 + 480) / 960) as u16;
        ScreenConfig {
            width,
            height,
            width_mm: mm(width),
            height_mm: mm(height),
        }
    }
}

impl Default for ScreenConfig {
    fn default() -> Self {
        ScreenConfig {
            width: 1280,
            height: 800,
            width_mm: 338,
            height_mm: 211,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub display: u16,
    pub listen_tcp: bool,
    pub listen_unix: bool,
    /// Unknown opcodes close the connection instead of being skipped
    pub strict_opcodes: bool,
    pub vendor: String,
    pub release_number: u32,
    pub screen: ScreenConfig,
    pub auth: AuthPolicy,
    /// Pending output, in bytes, after which a client that is not reading
    /// its events is disconnected
    pub client_queue_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            display: 1,
            listen_tcp: true,
            listen_unix: cfg!(unix),
            strict_opcodes: false,
            vendor: "x11core".to_string(),
            release_number: 1,
            screen: ScreenConfig::default(),
            auth: AuthPolicy::default(),
            client_queue_limit: DEFAULT_QUEUE_LIMIT,
        }
    }
}

impl ServerConfig {
    pub fn tcp_port(&self) -> u16 {
        crate::connection::tcp_port(self.display)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.display, 1);
        assert_eq!(config.tcp_port(), 6001);
        assert_eq!(config.vendor, "x11core");
        assert_eq!(config.screen, ScreenConfig::default());
        assert!(!config.strict_opcodes);
        assert_eq!(config.client_queue_limit, 16 * 1024 * 1024);
    }

    #[test]
    fn test_physical_size_at_96_dpi() {
        let screen = ScreenConfig::with_size(1920, 1080);
        assert_eq!(screen.width_mm, 508);
        assert_eq!(screen.height_mm, 286);
    }
}
