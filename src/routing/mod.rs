//! Routing matched players to their destination

pub mod strategy;

pub use strategy::{
    DirectRouting, Destination, RelayRouting, RoutedPlayer, RoutingMode, RoutingStrategy,
};
