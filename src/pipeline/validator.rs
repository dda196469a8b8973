//! 内容校验协作者
//!
//! 改写后的内容在写回前经过校验，否定判定使工作单元进入失败终态。
//! 生产实现是轻量的结构检查，契约在于接口而非启发式本身。

use async_trait::async_trait;

use crate::pipeline::scanner::SourceCategory;

/// 校验判定
#[derive(Debug, Clone)]
pub struct Verdict {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Verdict {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// 校验协作者
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, content: &str, category: SourceCategory) -> Verdict;
}

/// 结构校验器：检查括号在字符串与注释之外是否配对
#[derive(Debug, Default)]
pub struct StructuralValidator;

#[async_trait]
impl Validator for StructuralValidator {
    async fn validate(&self, content: &str, _category: SourceCategory) -> Verdict {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let mut stack: Vec<(char, usize)> = Vec::new();
        let mut line = 1usize;

        #[derive(PartialEq, Clone, Copy)]
        enum Mode {
            Code,
            Single,
            Double,
            Backtick,
            LineComment,
            BlockComment,
        }
        let mut mode = Mode::Code;
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '\n' {
                line += 1;
                if mode == Mode::LineComment {
                    mode = Mode::Code;
                }
                continue;
            }
            match mode {
                Mode::Code => match c {
                    '\'' => mode = Mode::Single,
                    '"' => mode = Mode::Double,
                    '`' => mode = Mode::Backtick,
                    '/' => match chars.peek() {
                        Some('/') => {
                            chars.next();
                            mode = Mode::LineComment;
                        }
                        Some('*') => {
                            chars.next();
                            mode = Mode::BlockComment;
                        }
                        _ => {}
                    },
                    '(' | '[' | '{' => stack.push((c, line)),
                    ')' | ']' | '}' => {
                        let expected = match c {
                            ')' => '(',
                            ']' => '[',
                            _ => '{',
                        };
                        match stack.pop() {
                            Some((open, _)) if open == expected => {}
                            Some((open, open_line)) => errors.push(format!(
                                "第 {} 行的 {:?} 与第 {} 行的 {:?} 不匹配",
                                line, c, open_line, open
                            )),
                            None => errors.push(format!("第 {} 行出现多余的 {:?}", line, c)),
                        }
                    }
                    _ => {}
                },
                Mode::Single => match c {
                    '\\' => {
                        chars.next();
                    }
                    '\'' => mode = Mode::Code,
                    _ => {}
                },
                Mode::Double => match c {
                    '\\' => {
                        chars.next();
                    }
                    '"' => mode = Mode::Code,
                    _ => {}
                },
                Mode::Backtick => match c {
                    '\\' => {
                        chars.next();
                    }
                    '`' => mode = Mode::Code,
                    _ => {}
                },
                Mode::LineComment => {}
                Mode::BlockComment => {
                    if c == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        mode = Mode::Code;
                    }
                }
            }
        }

        for (open, open_line) in stack {
            errors.push(format!("第 {} 行的 {:?} 未闭合", open_line, open));
        }
        match mode {
            Mode::Single | Mode::Double => errors.push("字符串字面量未闭合".to_string()),
            Mode::Backtick => warnings.push("模板字符串可能未闭合".to_string()),
            Mode::BlockComment => warnings.push("块注释未闭合".to_string()),
            _ => {}
        }

        Verdict {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}
