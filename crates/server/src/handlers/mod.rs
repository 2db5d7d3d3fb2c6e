//! HTTP request handlers.

pub mod franchises;
pub mod health;
pub mod imports;
pub mod lookup;

pub use franchises::*;
pub use health::*;
pub use imports::*;
pub use lookup::*;
