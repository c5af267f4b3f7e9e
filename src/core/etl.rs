use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::ResourceMonitor;

/// What a completed run produced and where it was persisted.
#[derive(Debug)]
pub struct RunOutcome<T> {
    pub output: T,
    pub output_path: String,
}

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: ResourceMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: ResourceMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<RunOutcome<P::Output>> {
        tracing::info!("Starting screener run");
        self.monitor.log_phase("start");

        tracing::info!("Extracting data...");
        let raw_data = self.pipeline.extract().await?;
        self.monitor.log_phase("extract");

        tracing::info!("Transforming data...");
        let output = self.pipeline.transform(raw_data).await?;
        self.monitor.log_phase("transform");

        tracing::info!("Loading data...");
        let output_path = self.pipeline.load(&output).await?;
        self.monitor.log_phase("load");
        tracing::info!("Output saved to: {}", output_path);

        self.monitor.log_final();
        Ok(RunOutcome {
            output,
            output_path,
        })
    }
}
