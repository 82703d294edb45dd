pub mod defaults {
    use crate::{
        sandbox::Sandbox, service::ServiceConfig, types::ResourceLimits, CodeExecutionService,
        Result,
    };
    use tokio::time::Duration;

    /// Tighter than production and without namespaces, which need
    /// unprivileged user namespaces on the test host.
    pub fn default_test_limits() -> ResourceLimits {
        ResourceLimits {
            time_limit: default_timeout(),
            cpu_time: 5,
            memory: 256 * 1024 * 1024, // 256MB
            isolate_network: false,
            ..ResourceLimits::default()
        }
    }

    pub async fn setup_test_sandbox() -> Result<Sandbox> {
        Sandbox::new(default_test_limits()).await
    }

    pub fn setup_test_service(max_concurrent: usize) -> CodeExecutionService {
        CodeExecutionService::new(ServiceConfig {
            max_concurrent,
            limits: default_test_limits(),
            ..ServiceConfig::default()
        })
    }

    /// Compilers on a cold cache need more than the default budget.
    pub fn setup_compiled_service() -> CodeExecutionService {
        CodeExecutionService::new(ServiceConfig {
            limits: ResourceLimits {
                time_limit: extended_timeout(),
                cpu_time: 30,
                ..default_test_limits()
            },
            ..ServiceConfig::default()
        })
    }

    pub fn default_timeout() -> Duration {
        Duration::from_secs(5)
    }

    pub fn extended_timeout() -> Duration {
        Duration::from_secs(60)
    }
}
