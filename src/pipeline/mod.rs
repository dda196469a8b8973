//! 处理管道模块
//!
//! - **scanner**: 工作单元枚举与类别识别
//! - **filters**: 提取结果过滤
//! - **transform**: 占位键到最终键的整词替换
//! - **validator**: 写回前的内容校验协作者
//! - **orchestrator**: 受限并发的运行编排与统计

pub mod filters;
pub mod orchestrator;
pub mod scanner;
pub mod transform;
pub mod validator;

pub use filters::TextFilter;
pub use orchestrator::{Orchestrator, ProcessingStats, UnitReport, UnitState};
pub use scanner::{scan, SourceCategory, WorkUnit};
pub use transform::{apply_key_mapping, TransformOutcome};
pub use validator::{StructuralValidator, Validator, Verdict};
