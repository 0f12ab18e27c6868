//! Geofence Sentry - a motion sentry armed by a remote geofence flag.
//!
//! # Overview
//!
//! The sentry runs on a small controller with a passive-infrared sensor and a
//! camera. Once a second it checks a remote boolean flag; while the flag is
//! `true` it samples the sensor, and when motion is seen (at most once per
//! cooldown window) it takes a photo, uploads it to object storage and sends a
//! push alert carrying the photo's public URL.
//!
//! Photo handling runs on its own task per event, so a slow upload never
//! delays sensing.
//!
//! # Modules
//!
//! - [`sentry`]: the control loop and its tick decisions
//! - [`cooldown`]: admission policy between motion events
//! - [`pipeline`]: capture, upload and notify for one event
//! - [`probe`]: the remote arm flag
//! - [`sensor`]: the motion sensor input line
//! - [`camera`]: still capture
//! - [`cloud`]: storage upload, push messaging and their credentials
//! - [`retention`]: cleanup of local photos
//! - [`config`]: environment configuration
//! - [`model`]: shared data types
//! - [`error`]: error types

pub mod camera;
pub mod cloud;
pub mod config;
pub mod cooldown;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod probe;
pub mod retention;
pub mod sensor;
pub mod sentry;
