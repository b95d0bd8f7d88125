//! Behavioural scenarios for multi-stack coordination.

mod coordinator;
