//! Binary correctness decisions for candidate answers.

#[path = "judge/verdict.rs"]
mod verdict;

#[path = "judge/rules.rs"]
mod rules;

#[path = "judge/llm.rs"]
mod llm;

pub use llm::{judge_prompt, JudgeBackend, LlmJudge};
pub use rules::RuleJudge;
pub use verdict::{parse_verdict, Judge, Verdict};
