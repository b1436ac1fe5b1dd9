//! Built-in form schemas for the content generators.
//!
//! Each page of the front end submits one form. [`FormKind`] names them and
//! [`FormKind::schema`] returns the rules a submission is validated against.
//!
//! # Examples
//!
//! ```
//! use narrative_guard::forms::FormKind;
//!
//! let kind: FormKind = "battle-cards".parse().unwrap();
//! let schema = kind.schema();
//! assert!(schema.get("competitor").unwrap().required);
//! ```

pub mod schemas;

pub use schemas::FormKind;
