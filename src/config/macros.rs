/// Configuration macros for zero-repetition config definitions
///
/// `config_struct!` declares a configuration section together with its
/// defaults, so a field, its type and its default value live on one line.
///
/// # Example
/// ```
/// streamhub::config_struct! {
///     /// Per-connection settings
///     pub struct ExampleConnectionConfig {
///         queue_capacity: usize = 256,
///         heartbeat_interval_secs: u64 = 54,
///     }
/// }
///
/// let cfg = ExampleConnectionConfig::default();
/// assert_eq!(cfg.queue_capacity, 256);
/// ```
///
/// The generated struct has public fields, a `Default` impl with the listed
/// values, and `#[serde(default)]` so a partial TOML section keeps the
/// defaults for every key it omits.
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_name:ident: $field_type:ty = $default_value:expr
            ),*
            $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field_name: $field_type,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $(
                        $field_name: $default_value,
                    )*
                }
            }
        }
    };
}
