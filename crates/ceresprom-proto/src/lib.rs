//! ceresprom Proto - Wire messages for the CeresDB storage service
//!
//! This crate defines message content only, not framing or transport:
//! - `Expr`: the delegated computation tree (operands and sub-expressions)
//! - Query request/response carrying the tree and the resulting series
//! - Columnar write request/response

pub mod expr;
pub mod query;
pub mod write;

pub use expr::{Expr, Filter, FilterOperator, FilterType, Operand, Selector, SubExpr, SubExprType};
pub use query::{
    PrometheusQueryRequest, PrometheusQueryResponse, ResponseHeader, Sample, TimeSeries,
    CODE_NOT_FOUND, CODE_OK,
};
pub use write::{
    Field, FieldGroup, Tag, Value, WriteEntry, WriteMetric, WriteRequest, WriteResponse,
};
