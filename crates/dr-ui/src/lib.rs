//! dr-ui
//!
//! Server-rendered views: optimistic entity lists and analytics charts.

pub mod chart;
pub mod list;

pub use chart::{ChartKind, ChartPage, ChartPoint};
pub use list::{DetailPage, ListItemView, ListPage};
