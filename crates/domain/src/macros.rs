//! Macro for implementing Display and FromStr for string-backed enums
//!
//! Entity kinds and object types travel as lowercase strings in events,
//! configuration files and database columns. This macro keeps the string
//! form in one place per enum.
//!
//! # Example
//!
//! ```rust
//! use crmsync_domain::impl_domain_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Side {
//!     Left,
//!     Right,
//! }
//!
//! impl_domain_enum_conversions!(Side {
//!     Left => "left",
//!     Right => "right",
//! });
//!
//! assert_eq!(Side::Left.to_string(), "left");
//! assert_eq!("RIGHT".parse::<Side>(), Ok(Side::Right));
//! ```

/// Implements Display and FromStr traits for string-backed enums
///
/// Parsing is case-insensitive; display is always the declared string.
#[macro_export]
macro_rules! impl_domain_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
