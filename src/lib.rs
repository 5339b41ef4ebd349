//! Async Rust client library for the Hack The Box v4 REST API.
//!
//! Provides credential and two-factor authentication, an authenticated
//! HTTP client with refresh-on-401 retry, and lazily loaded resource
//! objects for profiles, machines, challenges, teams and the current
//! account.
//!
//! # Modules
//!
//! - [`auth`] — Token and 2FA session state, plus the [`TokenStore`](auth::TokenStore)
//!   persistence trait.
//! - [`client`] — Authenticated HTTP wrapper with the auth state machine.
//! - [`error`] — Typed error hierarchy (`HtbError`) for all library operations.
//! - [`resource`] — The lazy-loading resource model (`LazyResource`).
//! - [`search`] — Multi-kind search against `/search/fetch`.
//! - [`profiles`] / [`machines`] / [`challenges`] / [`teams`] — Per-kind finders.
//! - [`user`] — The authenticated account.
//!
//! # Quick Start
//!
//! ```ignore
//! use htb_api::client::{HtbClient, LoginOutcome};
//! use htb_api::machines::find_machine;
//!
//! let client = HtbClient::new(None);
//! if let LoginOutcome::TwoFactorRequired = client.login(email, password).await? {
//!     client.submit_two_factor(&prompt_for_otp()).await?;
//! }
//!
//! let mut lame = find_machine(&client, "Lame").await?.ok_or("no such box")?;
//! let os = lame.get_or_load(&client, "os").await?;
//! println!("Lame runs {os}");
//! ```

#![warn(missing_docs)]

pub mod auth;
pub mod challenges;
pub mod client;
pub mod error;
pub mod machines;
pub mod profiles;
pub mod resource;
pub mod search;
pub mod teams;
pub mod user;
