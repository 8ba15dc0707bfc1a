//! Terminal front end for ManimGen: prompt entry and live job tracking.

pub mod flow;
pub mod view;
