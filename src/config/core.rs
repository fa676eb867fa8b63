use serde::{Deserialize, Serialize};

/// Root configuration structure for sqlctxize
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SqlctxizeConfig {
    /// Which calls are retargeted and which functions count as program entry
    #[serde(default)]
    pub rewrite: RewriteConfig,

    /// How HTTP and framework entry points are recognized
    #[serde(default)]
    pub entry_points: EntryPointConfig,

    /// Output formatting
    #[serde(default)]
    pub emit: EmitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RewriteConfig {
    /// Type names in `database/sql` whose pointer receivers are retargeted
    #[serde(default = "default_handle_types")]
    pub handle_types: Vec<String>,

    /// Package path matched by substring against receiver types for the sqlx table
    #[serde(default = "default_extended_package")]
    pub extended_package: String,

    /// Function names that never gain a context parameter
    #[serde(default = "default_entry_functions")]
    pub entry_functions: Vec<String>,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            handle_types: default_handle_types(),
            extended_package: default_extended_package(),
            entry_functions: default_entry_functions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryPointConfig {
    /// Package identifier qualifying `ResponseWriter` and `Request`
    #[serde(default = "default_http_package")]
    pub http_package: String,

    /// Package identifier qualifying `Context` and `HandlerFunc`
    #[serde(default = "default_framework_package")]
    pub framework_package: String,

    /// Seed from the declared parameter name instead of the literal `r` / `c`
    #[serde(default)]
    pub use_declared_names: bool,
}

impl Default for EntryPointConfig {
    fn default() -> Self {
        Self {
            http_package: default_http_package(),
            framework_package: default_framework_package(),
            use_declared_names: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmitConfig {
    /// Run the canonical formatter over rewritten output
    #[serde(default = "default_format")]
    pub format: bool,

    /// Formatter executable, looked up on PATH
    #[serde(default = "default_formatter")]
    pub formatter: String,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            formatter: default_formatter(),
        }
    }
}

fn default_handle_types() -> Vec<String> {
    vec!["DB".to_string()]
}
fn default_extended_package() -> String {
    "github.com/jmoiron/sqlx".to_string()
}
fn default_entry_functions() -> Vec<String> {
    vec!["main".to_string()]
}
fn default_http_package() -> String {
    "http".to_string()
}
fn default_framework_package() -> String {
    "echo".to_string()
}
fn default_format() -> bool {
    true
}
fn default_formatter() -> String {
    "gofmt".to_string()
}
