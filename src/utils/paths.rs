//! 跨平台路径匹配工具模块
//!
//! 扫描器的文件模式匹配统一在规范化后的路径上进行：
//! - Windows、macOS、Linux 跨平台兼容（反斜杠统一为 /）
//! - 大小写不敏感（统一转小写后匹配）
//! - 排除目录按路径分段精确比较，避免 `node_modules_x` 误中

use std::path::Path;

/// 内置排除目录：依赖目录、构建产物、版本库内部目录
pub const DEFAULT_EXCLUDED_DIRS: [&str; 5] =
    ["node_modules", "target", "vendor", ".git", "bower_components"];

/// 规范化路径用于 glob 匹配：反斜杠转正斜杠并转小写
pub fn normalize_for_match(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

/// 判断路径是否位于某个排除目录内（按分段比较，大小写不敏感）
pub fn is_in_excluded_dir(path: &Path, extra_excluded: &[String]) -> bool {
    for component in path.components() {
        let segment = component.as_os_str().to_string_lossy().to_lowercase();
        if DEFAULT_EXCLUDED_DIRS.contains(&segment.as_str()) {
            return true;
        }
        if extra_excluded.iter().any(|e| e.to_lowercase() == segment) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_normalize_backslashes_and_case() {
        let path = PathBuf::from(r"C:\Work\App\Package.JSON");
        assert_eq!(normalize_for_match(&path), "c:/work/app/package.json");
    }

    #[test]
    fn test_excluded_dir_segment_match() {
        assert!(is_in_excluded_dir(
            &PathBuf::from("/work/app/node_modules/lodash/index.js"),
            &[]
        ));
        assert!(!is_in_excluded_dir(
            &PathBuf::from("/work/app/node_modules_backup/index.js"),
            &[]
        ));
    }

    #[test]
    fn test_extra_excluded_dirs() {
        assert!(is_in_excluded_dir(
            &PathBuf::from("/work/app/Build/out.js"),
            &["build".to_string()]
        ));
    }
}
