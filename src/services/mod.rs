//! Service layer for the crawler application.
//!
//! This module contains the clients for the two upstream collaborators:
//! - Log export paging (`PlcLogClient`)
//! - Endpoint self-description (`DescribeClient`)

mod describe;
mod plc;

pub use describe::{DescribeClient, EndpointDescriber};
pub use plc::{LogPageFetcher, PlcLogClient, format_cursor, parse_page};
