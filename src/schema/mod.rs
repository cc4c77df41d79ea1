//! 谓词模式模块：请求类的查询字段描述、取值语法与结果类型解析。
//!
//! # Predicate Schema Module
//!
//! Every Space-Track request class exposes a `modeldef` endpoint describing the
//! fields ("predicates") it can be queried by. This module parses those
//! descriptions, renders caller values into Space-Track's operator syntax, and
//! optionally converts result rows into typed values.
//!
//! | Item | Description |
//! |------|-------------|
//! | [`Predicate`] | One parsed field description |
//! | [`parse_modeldef`] | Modeldef `data` array to predicates |
//! | [`PredicateValue`] | Caller value, including operators |
//! | [`parse_rows`] | Typed conversion of JSON rows |

pub mod predicate;
pub mod typed;
pub mod value;

pub use predicate::{
    parse_modeldef, parse_modeldef_response, rest_predicates, Predicate, PredicateType,
};
pub use typed::{parse_rows, TypedRow, TypedValue, UnknownTypePolicy};
pub use value::{
    greater_than, inclusive_range, less_than, like, not_equal, startswith, Operator,
    PredicateValue,
};
