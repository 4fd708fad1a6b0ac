//! lms-auth - Session and token lifecycle core for the LMS backend
//!
//! Issues short-lived signed access tokens, keeps one long-lived refresh
//! token per (user, device) pair, rotates it on every successful refresh and
//! revokes it on logout or in bulk. Credential verification, registration,
//! profile CRUD and HTTP routing live in the surrounding application and
//! reach this crate only through the [`core::auth::SessionService`] entry
//! points and the collaborator traits in [`core::identity`].

pub mod core;
