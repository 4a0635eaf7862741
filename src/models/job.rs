use serde::Serialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// 大小分组
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SizeGroup {
    /// ≥ 30 MB
    Large,
    /// 10 – 30 MB
    Medium,
    /// < 10 MB
    Small,
}

impl SizeGroup {
    /// 执行顺序：大 → 中 → 小
    pub const ORDER: [SizeGroup; 3] = [SizeGroup::Large, SizeGroup::Medium, SizeGroup::Small];

    pub fn for_size(size_mb: f64) -> Self {
        if size_mb < 10.0 {
            SizeGroup::Small
        } else if size_mb < 30.0 {
            SizeGroup::Medium
        } else {
            SizeGroup::Large
        }
    }

    /// 该分组默认的工作线程上限
    pub fn default_workers(&self) -> usize {
        match self {
            SizeGroup::Large => 2,
            SizeGroup::Medium => 3,
            SizeGroup::Small => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SizeGroup::Large => "大文件",
            SizeGroup::Medium => "中等文件",
            SizeGroup::Small => "小文件",
        }
    }
}

/// 页码区间，`start` 从 0 开始，`end` 不包含
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 拆分分片信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartInfo {
    /// 从 1 开始
    pub index: u32,
    pub count: u32,
    /// 分片在原文件中的首页和末页（从 1 开始，含末页）
    pub first_page: u32,
    pub last_page: u32,
}

/// 一个提交给远端的作业
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: usize,
    /// 实际上传的文件（分片或原文件）
    pub file_path: PathBuf,
    pub original_file: PathBuf,
    pub part: Option<PartInfo>,
    /// 输出页码的起始偏移
    pub page_offset: u32,
    pub page_count: u32,
    pub size_mb: f64,
    pub group: SizeGroup,
}

impl Job {
    /// 不拆分的整文件作业
    pub fn whole_file(id: usize, path: &Path, size_mb: f64, page_count: u32, page_offset: u32) -> Self {
        Self {
            id,
            file_path: path.to_path_buf(),
            original_file: path.to_path_buf(),
            part: None,
            page_offset,
            page_count,
            size_mb,
            group: SizeGroup::for_size(size_mb),
        }
    }

    pub fn is_split_part(&self) -> bool {
        self.part.is_some()
    }

    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.file_path.display().to_string())
    }

    /// 原文件名（不含扩展名）
    pub fn original_stem(&self) -> String {
        self.original_file
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("job_{}", self.id))
    }

    /// 输出文件的基础名：分片为 `<stem>_pag<首页>-<末页>`
    pub fn output_base_name(&self) -> String {
        match self.part {
            Some(part) => format!(
                "{}_pag{:04}-{:04}",
                self.original_stem(),
                part.first_page,
                part.last_page
            ),
            None => self.original_stem(),
        }
    }
}

impl Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.part {
            Some(part) => write!(
                f,
                "[作业 {} {} 分片 {}/{}]",
                self.id,
                self.original_stem(),
                part.index,
                part.count
            ),
            None => write!(f, "[作业 {} {}]", self.id, self.original_stem()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_group_boundaries() {
        assert_eq!(SizeGroup::for_size(9.99), SizeGroup::Small);
        assert_eq!(SizeGroup::for_size(10.0), SizeGroup::Medium);
        assert_eq!(SizeGroup::for_size(29.9), SizeGroup::Medium);
        assert_eq!(SizeGroup::for_size(30.0), SizeGroup::Large);
    }

    #[test]
    fn test_job_display() {
        let mut job = Job::whole_file(3, Path::new("/in/tomo1.pdf"), 2.0, 10, 0);
        assert_eq!(job.to_string(), "[作业 3 tomo1]");
        assert_eq!(job.output_base_name(), "tomo1");
        job.part = Some(PartInfo {
            index: 2,
            count: 4,
            first_page: 11,
            last_page: 20,
        });
        assert_eq!(job.to_string(), "[作业 3 tomo1 分片 2/4]");
        assert_eq!(job.output_base_name(), "tomo1_pag0011-0020");
    }
}
