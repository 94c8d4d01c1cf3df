use serde::{Deserialize, Serialize};

/// Process-wide scheduler configuration held in storage.
///
/// Re-read fresh at the start of every scheduler cycle and never cached, so
/// flipping the flag takes effect at the next cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Master enablement switch. When false no workflow is fired and no
    /// schedule state is advanced.
    #[serde(default = "default_enabled")]
    pub global_enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            global_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_by_default() {
        assert!(GlobalConfig::default().global_enabled);

        let config: GlobalConfig = serde_json::from_str("{}").unwrap();
        assert!(config.global_enabled);
    }
}
