//! 工作单元扫描
//!
//! 枚举待处理的源文件并识别类别。扫描只看路径与元数据，
//! 文件内容由编排器在处理时读取。

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::ScanConfig;

/// 源文件类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCategory {
    Js,
    Jsx,
    Ts,
    Tsx,
    Vue,
}

impl SourceCategory {
    /// 按扩展名识别类别
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "js" => Some(SourceCategory::Js),
            "jsx" => Some(SourceCategory::Jsx),
            "ts" => Some(SourceCategory::Ts),
            "tsx" => Some(SourceCategory::Tsx),
            "vue" => Some(SourceCategory::Vue),
            _ => None,
        }
    }

    /// 类别名（用于提示词和日志）
    pub fn name(&self) -> &'static str {
        match self {
            SourceCategory::Js => "JavaScript",
            SourceCategory::Jsx => "React JSX",
            SourceCategory::Ts => "TypeScript",
            SourceCategory::Tsx => "React TSX",
            SourceCategory::Vue => "Vue",
        }
    }
}

/// 一个待处理的源文件
#[derive(Debug, Clone)]
pub struct WorkUnit {
    pub path: PathBuf,
    pub category: SourceCategory,
}

/// 枚举根目录下所有可处理的工作单元
pub fn scan(root: &Path, config: &ScanConfig) -> Vec<WorkUnit> {
    let mut units = Vec::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() {
            // 隐藏目录与构建产物整体跳过
            if name.starts_with('.') && name.len() > 1 && entry.depth() > 0 {
                return false;
            }
            return !config.skip_dirs.iter().any(|skip| skip == name.as_ref());
        }
        true
    });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("扫描目录失败，已跳过: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !config.extensions.iter().any(|allowed| allowed == ext) {
            continue;
        }
        let Some(category) = SourceCategory::from_extension(ext) else {
            continue;
        };

        if let Ok(meta) = entry.metadata() {
            if meta.len() > config.max_file_size {
                tracing::debug!("文件超过大小上限，已跳过: {}", path.display());
                continue;
            }
        }

        units.push(WorkUnit {
            path: path.to_path_buf(),
            category,
        });
    }

    units.sort_by(|a, b| a.path.cmp(&b.path));
    units
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_detection() {
        assert_eq!(SourceCategory::from_extension("tsx"), Some(SourceCategory::Tsx));
        assert_eq!(SourceCategory::from_extension("vue"), Some(SourceCategory::Vue));
        assert_eq!(SourceCategory::from_extension("rs"), None);
    }

    #[test]
    fn test_scan_filters_by_extension_and_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join("src/app.tsx"), "export default 1;").unwrap();
        std::fs::write(root.join("src/notes.md"), "# notes").unwrap();
        std::fs::write(root.join("node_modules/pkg/index.js"), "module.exports = 1;").unwrap();

        let units = scan(root, &ScanConfig::default());
        assert_eq!(units.len(), 1);
        assert!(units[0].path.ends_with("src/app.tsx"));
        assert_eq!(units[0].category, SourceCategory::Tsx);
    }
}
