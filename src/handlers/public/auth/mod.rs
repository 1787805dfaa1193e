// handlers/public/auth/mod.rs - Credential endpoints of the auth service
//
// These are the only routes that accept a username and password. Both answer
// with the same shapes regardless of whether the user exists, except where
// the response has to say so (404 on password change).

pub mod login;
pub mod password;

pub use login::login;
pub use password::change_password;
