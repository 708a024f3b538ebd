/// Router Module Index
///
/// Splits the portal's routes by what they need from the session. Access itself is decided
/// by the router-wide gate (`gate::access_gate`), not by these modules.

/// Routes that work without a backend session: health, auth pages, theme.
pub mod public;

/// Pages that call the backend on the user's behalf and take a `SessionToken`.
pub mod authenticated;
