use tracing::debug;

use crate::{
    executor::create_executor,
    supervisor::Supervisor,
    types::{ErrorType, ExecutionOutcome, Language, ResourceLimits},
};

/// Routes a request to the in-process interpreter or to a language runner.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    supervisor: Supervisor,
}

impl Dispatcher {
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            supervisor: Supervisor::new(limits),
        }
    }

    /// Check a request without touching any execution resource.
    ///
    /// A missing or blank selector means [`Language::Custom`]. Rejections come
    /// back as `API_ERROR` outcomes with no elapsed time.
    pub fn validate(
        &self,
        code: &str,
        language: Option<&str>,
    ) -> Result<Language, ExecutionOutcome> {
        let language = match language.map(str::trim).filter(|s| !s.is_empty()) {
            None => Language::Custom,
            Some(selector) => selector
                .parse::<Language>()
                .map_err(|e| ExecutionOutcome::error(ErrorType::ApiError, e))?,
        };

        if code.trim().is_empty() {
            return Err(ExecutionOutcome::error(
                ErrorType::ApiError,
                "Code must not be empty",
            ));
        }

        let max = self.supervisor.limits().max_code_size;
        if code.len() > max {
            return Err(ExecutionOutcome::error(
                ErrorType::ApiError,
                format!("Code exceeds the maximum size of {} bytes", max),
            ));
        }

        Ok(language)
    }

    /// Run already validated code.
    pub async fn run(&self, language: Language, code: &str) -> ExecutionOutcome {
        debug!(%language, bytes = code.len(), "Dispatching");
        match create_executor(language) {
            None => self.supervisor.run_script(code.to_string()).await,
            Some(executor) => self.supervisor.run_recipe(executor.as_ref(), code).await,
        }
    }

    /// Validate then run.
    pub async fn dispatch(&self, code: &str, language: Option<&str>) -> ExecutionOutcome {
        match self.validate(code, language) {
            Ok(language) => self.run(language, code).await,
            Err(rejection) => rejection,
        }
    }
}
