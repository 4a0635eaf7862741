//! 拆分规划器
//!
//! ## 职责
//!
//! 纯函数：根据文件度量和服务限制，判断是否需要拆分，并给出带评分的拆分方案。
//!
//! ## 核心功能
//!
//! 1. **拆分判断**：`analyze`，大小或页数超过限制（未缩放）即需拆分
//! 2. **方案计算**：`plan`，按上取整平均分配页数，并给出效率评分
//! 3. **最优方案**：`optimal_plan`，在 `required..=required+2` 中取评分最高者
//! 4. **备选方案**：`alternative_plans`，最多 3 个，按评分降序

use crate::error::{OcrError, OcrResult};
use crate::models::FileMetrics;
use serde::Serialize;

/// 视为 "理想" 方案的阈值
const OPTIMAL_MAX_MB: f64 = 50.0;
const OPTIMAL_MAX_PAGES: u32 = 150;
const OPTIMAL_MIN_SCORE: f64 = 0.8;

/// 备选方案中尝试的固定每份页数
const CHUNK_CANDIDATES: [u32; 2] = [50, 100];

/// 高 / 低密度阈值（MB / 页）
const HIGH_DENSITY: f64 = 1.0;
const LOW_DENSITY: f64 = 0.1;

pub const NO_SPLIT_STRATEGY: &str = "no-split-required";

/// 远端服务的大小与页数限制
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SplitLimits {
    pub max_size_mb: f64,
    pub max_pages: u32,
    pub safety_factor_size: f64,
    pub safety_factor_pages: f64,
    /// 每个分片额外的 PDF 结构开销
    pub overhead_mb: f64,
}

impl Default for SplitLimits {
    fn default() -> Self {
        Self {
            max_size_mb: 48.0,
            max_pages: 135,
            safety_factor_size: 0.97,
            safety_factor_pages: 0.90,
            overhead_mb: 0.5,
        }
    }
}

impl SplitLimits {
    pub fn safe_max_size(&self) -> f64 {
        self.max_size_mb * self.safety_factor_size
    }

    pub fn safe_max_pages(&self) -> u32 {
        (self.max_pages as f64 * self.safety_factor_pages).floor() as u32
    }

    pub fn validate(&self) -> OcrResult<()> {
        let factor_ok = |f: f64| f > 0.0 && f <= 1.0;
        if !factor_ok(self.safety_factor_size) || !factor_ok(self.safety_factor_pages) {
            return Err(OcrError::config("安全系数必须在 (0, 1] 之间"));
        }
        if self.safe_max_size() <= 0.0 {
            return Err(OcrError::config(format!(
                "安全大小上限必须大于 0 (max_size_mb = {})",
                self.max_size_mb
            )));
        }
        if self.safe_max_pages() < 1 {
            return Err(OcrError::config(format!(
                "安全页数上限至少为 1 (max_pages = {})",
                self.max_pages
            )));
        }
        if self.overhead_mb < 0.0 {
            return Err(OcrError::config("overhead_mb 不能为负数"));
        }
        Ok(())
    }
}

/// 拆分需求分析
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitAnalysis {
    pub metrics: FileMetrics,
    pub limits: SplitLimits,
    pub requires_splitting: bool,
    pub reason: String,
    pub min_files_by_size: u32,
    pub min_files_by_pages: u32,
    pub required_files: u32,
}

/// 拆分方案
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitPlan {
    pub num_files: u32,
    pub pages_per_file: u32,
    pub estimated_mb_per_file: f64,
    pub total_pages: u32,
    pub total_size_mb: f64,
    pub strategy: String,
    pub efficiency_score: f64,
    pub warnings: Vec<String>,
}

impl SplitPlan {
    /// 各项都在理想范围内
    pub fn is_optimal(&self) -> bool {
        self.estimated_mb_per_file <= OPTIMAL_MAX_MB
            && self.pages_per_file <= OPTIMAL_MAX_PAGES
            && self.efficiency_score >= OPTIMAL_MIN_SCORE
    }

    pub fn is_split(&self) -> bool {
        self.num_files > 1
    }
}

/// 分析文件是否需要拆分
pub fn analyze(metrics: &FileMetrics, limits: &SplitLimits) -> SplitAnalysis {
    let size_exceeded = metrics.size_mb > limits.max_size_mb;
    let pages_exceeded = metrics.total_pages > limits.max_pages;

    let reason = if size_exceeded {
        format!(
            "大小超出限制: {:.1} MB > {} MB",
            metrics.size_mb, limits.max_size_mb
        )
    } else if pages_exceeded {
        format!(
            "页数超出限制: {} 页 > {} 页",
            metrics.total_pages, limits.max_pages
        )
    } else {
        "文件在限制范围内".to_string()
    };

    let min_files_by_size = (metrics.size_mb / limits.safe_max_size()).ceil().max(0.0) as u32;
    let min_files_by_pages = metrics.total_pages.div_ceil(limits.safe_max_pages().max(1));

    SplitAnalysis {
        metrics: metrics.clone(),
        limits: *limits,
        requires_splitting: size_exceeded || pages_exceeded,
        reason,
        min_files_by_size,
        min_files_by_pages,
        required_files: min_files_by_size.max(min_files_by_pages),
    }
}

/// 不需要拆分时的标准方案
pub fn no_split_plan(analysis: &SplitAnalysis) -> SplitPlan {
    SplitPlan {
        num_files: 1,
        pages_per_file: analysis.metrics.total_pages,
        estimated_mb_per_file: analysis.metrics.size_mb,
        total_pages: analysis.metrics.total_pages,
        total_size_mb: analysis.metrics.size_mb,
        strategy: NO_SPLIT_STRATEGY.to_string(),
        efficiency_score: 1.0,
        warnings: Vec::new(),
    }
}

/// 计算拆分方案
///
/// # 参数
/// - `analysis`: 拆分需求分析
/// - `num_files`: 指定份数；`None` 时使用 `required_files`
///
/// # 返回
/// 不需要拆分时返回标准方案；指定份数无法全部分到页面时，按实际可得份数修正并附带警告
pub fn plan(analysis: &SplitAnalysis, num_files: Option<u32>) -> SplitPlan {
    if !analysis.requires_splitting {
        return no_split_plan(analysis);
    }

    let metrics = &analysis.metrics;
    let limits = &analysis.limits;
    let total_pages = metrics.total_pages;
    let mut warnings = Vec::new();

    let requested = num_files.unwrap_or(analysis.required_files).max(1);
    let pages_per_file = total_pages.div_ceil(requested);
    let n = if pages_per_file > 0 {
        total_pages.div_ceil(pages_per_file)
    } else {
        requested
    };
    if n != requested {
        warnings.push(format!(
            "{} 页无法分成 {} 份非空文件，实际为 {} 份",
            total_pages, requested, n
        ));
    }

    let mb_per_file = metrics.size_mb / n as f64 + limits.overhead_mb;
    let safe_size = limits.safe_max_size();
    let safe_pages = limits.safe_max_pages();

    let mut strategy = "balanced".to_string();
    if mb_per_file > safe_size {
        warnings.push(format!(
            "每份大小 {:.1} MB 超出安全上限 {:.1} MB",
            mb_per_file, safe_size
        ));
        strategy = "size-constrained".to_string();
    }
    if pages_per_file > safe_pages {
        warnings.push(format!(
            "每份页数 {} 超出安全上限 {}",
            pages_per_file, safe_pages
        ));
        strategy = "page-constrained".to_string();
    }

    let efficiency_score = efficiency_score(limits, mb_per_file, pages_per_file, n);

    SplitPlan {
        num_files: n,
        pages_per_file,
        estimated_mb_per_file: mb_per_file,
        total_pages,
        total_size_mb: metrics.size_mb,
        strategy: with_density_qualifier(strategy, metrics.density),
        efficiency_score,
        warnings,
    }
}

/// 效率评分，未截断到 [0, 1]
fn efficiency_score(limits: &SplitLimits, mb_per_file: f64, pages_per_file: u32, n: u32) -> f64 {
    let size_eff = if mb_per_file > 0.0 {
        (limits.safe_max_size() / mb_per_file).min(1.0)
    } else {
        0.0
    };
    let page_eff = if pages_per_file > 0 {
        (limits.safe_max_pages() as f64 / pages_per_file as f64).min(1.0)
    } else {
        0.0
    };
    let balance = 1.0 - (size_eff - page_eff).abs() * 0.5;
    let penalty = ((n as f64 - 5.0) * 0.05).max(0.0);

    size_eff * 0.4 + page_eff * 0.4 + balance * 0.2 - penalty
}

fn with_density_qualifier(strategy: String, density: f64) -> String {
    let qualifier = if density > HIGH_DENSITY {
        "high-density"
    } else if density < LOW_DENSITY {
        "low-density"
    } else {
        return strategy;
    };

    if strategy == "balanced" {
        qualifier.to_string()
    } else {
        format!("{}-{}", strategy, qualifier)
    }
}

/// 在 `required`、`required+1`、`required+2` 中选评分最高的方案（同分取先出现者）
pub fn optimal_plan(analysis: &SplitAnalysis) -> SplitPlan {
    if !analysis.requires_splitting {
        return no_split_plan(analysis);
    }

    let required = analysis.required_files.max(1);
    let mut best = plan(analysis, Some(required));
    for n in required + 1..=required + 2 {
        let candidate = plan(analysis, Some(n));
        if candidate.efficiency_score > best.efficiency_score {
            best = candidate;
        }
    }
    best
}

/// 备选方案，最多 3 个，按评分降序
pub fn alternative_plans(analysis: &SplitAnalysis) -> Vec<SplitPlan> {
    if !analysis.requires_splitting {
        return vec![no_split_plan(analysis)];
    }

    let required = analysis.required_files.max(1);
    let total_pages = analysis.metrics.total_pages;

    let mut candidates = vec![
        plan(analysis, Some(required)),
        plan(analysis, Some(required + 1)),
    ];
    for chunk in CHUNK_CANDIDATES {
        if chunk < total_pages {
            let candidate = plan(analysis, Some(total_pages.div_ceil(chunk)));
            if candidate.is_optimal() {
                candidates.push(candidate);
            }
        }
    }

    candidates.sort_by(|a, b| b.efficiency_score.total_cmp(&a.efficiency_score));

    let mut unique: Vec<SplitPlan> = Vec::new();
    for candidate in candidates {
        let seen = unique.iter().any(|p| {
            p.num_files == candidate.num_files && p.pages_per_file == candidate.pages_per_file
        });
        if !seen {
            unique.push(candidate);
        }
    }
    unique.truncate(3);
    unique
}

/// 方案的可读描述
pub fn format_plan(plan: &SplitPlan) -> String {
    let mut lines = Vec::new();
    if plan.is_split() {
        lines.push(format!(
            "拆分为 {} 份，每份约 {} 页 / {:.1} MB",
            plan.num_files, plan.pages_per_file, plan.estimated_mb_per_file
        ));
    } else {
        lines.push(format!(
            "无需拆分: {} 页 / {:.1} MB",
            plan.total_pages, plan.total_size_mb
        ));
    }
    lines.push(format!(
        "策略: {} | 效率评分: {:.2}",
        plan.strategy, plan.efficiency_score
    ));
    for warning in &plan.warnings {
        lines.push(format!("⚠️ {}", warning));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis_for(size_mb: f64, pages: u32) -> SplitAnalysis {
        analyze(
            &FileMetrics::new("doc.pdf", size_mb, pages),
            &SplitLimits::default(),
        )
    }

    #[test]
    fn test_safe_limits() {
        let limits = SplitLimits::default();
        assert!((limits.safe_max_size() - 46.56).abs() < 1e-9);
        assert_eq!(limits.safe_max_pages(), 121);
    }

    #[test]
    fn test_large_file_requires_four_parts() {
        let analysis = analysis_for(100.0, 400);

        assert!(analysis.requires_splitting);
        assert_eq!(analysis.min_files_by_size, 3);
        assert_eq!(analysis.min_files_by_pages, 4);
        assert_eq!(analysis.required_files, 4);

        let plan = plan(&analysis, None);
        assert_eq!(plan.num_files, 4);
        assert_eq!(plan.pages_per_file, 100);
        assert!((plan.estimated_mb_per_file - 25.5).abs() < 1e-9);
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn test_small_file_is_not_split() {
        let analysis = analysis_for(10.0, 50);
        assert!(!analysis.requires_splitting);

        let plan = optimal_plan(&analysis);
        assert_eq!(plan.num_files, 1);
        assert_eq!(plan.pages_per_file, 50);
        assert_eq!(plan.strategy, NO_SPLIT_STRATEGY);
        assert_eq!(plan.efficiency_score, 1.0);

        let alternatives = alternative_plans(&analysis);
        assert_eq!(alternatives, vec![plan]);
    }

    #[test]
    fn test_requires_splitting_matches_unscaled_limits() {
        for &(size, pages) in &[
            (48.0, 135),
            (48.01, 10),
            (5.0, 136),
            (47.0, 130),
            (0.0, 0),
            (200.0, 2000),
        ] {
            let analysis = analysis_for(size, pages);
            assert_eq!(analysis.requires_splitting, size > 48.0 || pages > 135);
        }
    }

    #[test]
    fn test_reason_prefers_size() {
        assert!(analysis_for(60.0, 500).reason.contains("大小"));
        assert!(analysis_for(10.0, 500).reason.contains("页数"));
    }

    #[test]
    fn test_ceiling_distribution_holds_for_every_request() {
        for &(size, pages) in &[(100.0, 400), (60.0, 137), (300.0, 5), (49.0, 1), (80.0, 1000)] {
            let analysis = analysis_for(size, pages);
            for n in 1..=12 {
                let p = plan(&analysis, Some(n));
                assert!(p.pages_per_file * p.num_files >= pages, "{} pages n={}", pages, n);
                assert!(p.pages_per_file * (p.num_files - 1) < pages, "{} pages n={}", pages, n);
            }
        }
    }

    #[test]
    fn test_unrealisable_count_is_normalised() {
        let analysis = analysis_for(300.0, 5);
        let p = plan(&analysis, Some(4));
        assert_eq!(p.pages_per_file, 2);
        assert_eq!(p.num_files, 3);
        assert!(p.warnings.iter().any(|w| w.contains("实际为 3 份")));
    }

    #[test]
    fn test_score_formula() {
        let analysis = analysis_for(100.0, 400);
        // mb = 25.5, pages = 100: both efficiencies are 1
        let p = plan(&analysis, Some(4));
        assert!((p.efficiency_score - 1.0).abs() < 1e-9);

        // n = 8 gets a 0.15 penalty
        let p8 = plan(&analysis, Some(8));
        assert!((p8.efficiency_score - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_constrained_strategy_and_density() {
        // 3 份: 50 + 0.5 MB 超过 46.56，134 页超过 121
        let analysis = analysis_for(150.0, 400);
        let p = plan(&analysis, Some(3));
        assert_eq!(p.strategy, "page-constrained");
        assert_eq!(p.warnings.len(), 2);
        assert!(p.efficiency_score < 1.0);

        let dense = analysis_for(300.0, 200);
        assert_eq!(plan(&dense, Some(8)).strategy, "high-density");

        let sparse = analysis_for(50.0, 1000);
        assert_eq!(plan(&sparse, Some(9)).strategy, "low-density");
    }

    #[test]
    fn test_optimal_plan_prefers_first_on_ties() {
        let analysis = analysis_for(100.0, 400);
        let best = optimal_plan(&analysis);
        assert_eq!(best.num_files, 4);
    }

    #[test]
    fn test_alternative_plans_are_sorted_and_unique() {
        let analysis = analysis_for(100.0, 400);
        let alternatives = alternative_plans(&analysis);

        assert!(!alternatives.is_empty() && alternatives.len() <= 3);
        for pair in alternatives.windows(2) {
            assert!(pair[0].efficiency_score >= pair[1].efficiency_score);
        }
        assert_eq!(alternatives[0].num_files, 4);
        let keys: Vec<_> = alternatives
            .iter()
            .map(|p| (p.num_files, p.pages_per_file))
            .collect();
        let mut deduped = keys.clone();
        deduped.dedup();
        assert_eq!(keys.len(), deduped.len());
    }

    #[test]
    fn test_format_plan() {
        let text = format_plan(&plan(&analysis_for(100.0, 400), None));
        assert!(text.contains("拆分为 4 份"));
        assert!(text.contains("balanced"));
    }
}
