use std::fmt::Write as _;

use matzip_core::domain::action::{Action, SearchStrategy};
use matzip_core::policy::ResolutionPolicy;
use tracing::{debug, warn};

use crate::llm::LlmClient;
use crate::tools;

/// The resolver's terminal output: always an executable action, however the
/// loop ended.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub action: Action,
    /// The model's stated rationale, when it offered one.
    pub reasoning: Option<String>,
    pub attempts: u32,
}

/// Bounded resolution loop: ask the model for a tool pick, reject
/// implausible candidates, and fall back to unified search when attempts
/// run out. Rejection reasons feed the next prompt so the model can
/// correct course.
pub struct IntentResolver<L> {
    llm: L,
    policy: ResolutionPolicy,
}

impl<L> IntentResolver<L> {
    pub fn new(llm: L, policy: ResolutionPolicy) -> Self {
        Self { llm, policy }
    }

    pub fn policy(&self) -> &ResolutionPolicy {
        &self.policy
    }
}

impl<L: LlmClient> IntentResolver<L> {
    pub async fn resolve(&self, query: &str) -> Resolution {
        let config = self.policy.config();
        let max_attempts = config.max_attempts.max(1);
        let mut reasoning = None;
        let mut rejection: Option<String> = None;

        for attempt in 0..max_attempts {
            let prompt = self.build_prompt(query, attempt, rejection.as_deref());
            let reply = match self.llm.resolve(&prompt).await {
                Ok(reply) => reply,
                Err(error) => {
                    warn!(
                        event_name = "resolver.model_error",
                        attempt,
                        error = %error,
                        "model call failed"
                    );
                    if attempt + 1 >= max_attempts {
                        // last resort: search the raw query as-is
                        return Resolution {
                            action: Action::unified(query, config.default_limit),
                            reasoning,
                            attempts: attempt + 1,
                        };
                    }
                    continue;
                }
            };

            if reply.text.is_some() {
                reasoning = reply.text.clone();
            }

            let candidate = reply.invocation.as_ref().and_then(|invocation| {
                let strategy = SearchStrategy::parse(&invocation.name)?;
                Some(Action::new(strategy, invocation.arguments.clone()))
            });

            let decision = self.policy.should_retry(candidate.as_ref(), query, attempt);
            if decision.retry {
                debug!(
                    event_name = "resolver.candidate_rejected",
                    attempt,
                    reason = %decision.reason,
                    "retrying resolution"
                );
                rejection = Some(decision.reason);
                continue;
            }

            let Some(action) = candidate else {
                return Resolution {
                    action: Action::unified(config.default_query.clone(), config.default_limit),
                    reasoning: reasoning
                        .or_else(|| Some("도구 선택 없음, 기본 통합 검색으로 대체".to_owned())),
                    attempts: attempt + 1,
                };
            };
            return Resolution { action, reasoning, attempts: attempt + 1 };
        }

        // unreachable while max_attempts >= 1; kept as a typed backstop
        Resolution {
            action: Action::unified(query, config.default_limit),
            reasoning,
            attempts: max_attempts,
        }
    }

    fn build_prompt(&self, query: &str, attempt: u32, rejection: Option<&str>) -> String {
        let mut prompt = format!(
            "사용자 질의: \"{query}\"\n\n여의도 맛집 검색을 위해 다음 도구들 중 가장 적절한 것을 선택해주세요:\n\n"
        );
        for (position, tool) in tools::catalog().iter().enumerate() {
            let _ = writeln!(prompt, "{}. {}: {}", position + 1, tool.name, tool.description);
        }
        prompt.push_str("\n사용자 질의를 분석하고 가장 적절한 도구를 사용해주세요.\n");

        if attempt > 0 {
            prompt.push_str(
                "\n이전 시도의 도구 선택이 적절하지 않았습니다. 더 넓은 범위로 검색되는 도구와 파라미터를 선택해주세요.\n",
            );
            if let Some(reason) = rejection {
                let _ = writeln!(prompt, "거절 사유: {reason}");
            }
        }
        prompt
    }
}
