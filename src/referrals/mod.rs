//! Referral inbox polled by origin servers

pub mod inbox;

pub use inbox::ReferralInbox;
