pub mod extract;
pub mod jwt;
pub mod password;

pub use extract::{AdminUser, AuthUser, MaybeAuthUser};
pub use jwt::{Claims, JwtService};
