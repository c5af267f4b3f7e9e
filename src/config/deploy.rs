//! Deployment parameters for the dashboard container: image tags, stack
//! selection, listener mode and the service shape, read from the environment a
//! CI job exports. Nothing here talks to a cloud provider; the plan is printed
//! for the provisioning and redeploy steps to consume.

use crate::utils::error::{Result, TrackerError};
use crate::utils::validation::{self, Validate};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub const CONTAINER_PORT: u16 = 8501;
pub const HEALTH_CHECK_PATH: &str = "/healthz";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_REPOSITORY: &str = "stock-tracker";
pub const DEFAULT_CLUSTER: &str = "stock-tracker-cluster";
pub const DEFAULT_SERVICE: &str = "stock-tracker-service";
pub const LATEST_TAG: &str = "latest";

/// Independently deployable infrastructure units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StackKind {
    /// The image repository.
    Registry,
    /// Load balancer, container service and auto-scaling.
    Service,
}

impl FromStr for StackKind {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "registry" | "ecr" => Ok(StackKind::Registry),
            "service" => Ok(StackKind::Service),
            other => Err(TrackerError::InvalidConfigValueError {
                field: "stack".to_string(),
                value: other.to_string(),
                reason: "expected 'registry' (or 'ecr') or 'service'".to_string(),
            }),
        }
    }
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackKind::Registry => write!(f, "registry"),
            StackKind::Service => write!(f, "service"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum ListenerMode {
    /// Port 80 straight to the target group.
    Http,
    /// Port 443 with a certificate for `domain`, port 80 redirected, and an
    /// alias record in the hosted zone.
    Https {
        domain: String,
        hosted_zone_id: String,
        certificate_arn: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRefs {
    pub commit: String,
    pub latest: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub path: &'static str,
    pub port: u16,
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scaling {
    pub min_tasks: u32,
    pub max_tasks: u32,
    pub target_cpu_percent: u32,
    pub scale_in_cooldown_secs: u64,
    pub scale_out_cooldown_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSpec {
    pub image: String,
    pub container_port: u16,
    pub cpu_units: u32,
    pub memory_mib: u32,
    pub health_check: HealthCheck,
    pub scaling: Scaling,
    pub listener: ListenerMode,
}

/// Forced redeploy of a fixed cluster/service after a new image is pushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedeployTarget {
    pub cluster: String,
    pub service: String,
    pub force_new_deployment: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentPlan {
    pub stack: StackKind,
    pub region: String,
    pub repository: String,
    pub images: ImageRefs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redeploy: Option<RedeployTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentConfig {
    pub account: String,
    pub region: String,
    pub repository: String,
    pub container_image: Option<String>,
    pub domain_name: Option<String>,
    pub certificate_arn: Option<String>,
    pub hosted_zone_id: Option<String>,
    pub cluster_name: String,
    pub service_name: String,
    pub commit_sha: String,
}

impl DeploymentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let account = get("CDK_DEFAULT_ACCOUNT").ok_or_else(|| TrackerError::MissingConfigError {
            field: "CDK_DEFAULT_ACCOUNT".to_string(),
        })?;
        let commit_sha = get("GITHUB_SHA")
            .or_else(|| get("COMMIT_SHA"))
            .ok_or_else(|| TrackerError::MissingConfigError {
                field: "GITHUB_SHA".to_string(),
            })?;

        Ok(Self {
            account,
            region: get("CDK_DEFAULT_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            repository: get("ECR_REPOSITORY_NAME")
                .unwrap_or_else(|| DEFAULT_REPOSITORY.to_string()),
            container_image: get("CONTAINER_IMAGE"),
            domain_name: get("DOMAIN_NAME"),
            certificate_arn: get("CERTIFICATE_ARN"),
            hosted_zone_id: get("HOSTED_ZONE_ID"),
            cluster_name: get("ECS_CLUSTER_NAME").unwrap_or_else(|| DEFAULT_CLUSTER.to_string()),
            service_name: get("ECS_SERVICE_NAME").unwrap_or_else(|| DEFAULT_SERVICE.to_string()),
            commit_sha,
        })
    }

    pub fn registry(&self) -> String {
        format!("{}.dkr.ecr.{}.amazonaws.com", self.account, self.region)
    }

    /// The same image pushed under the commit and `latest` tags.
    pub fn image_refs(&self) -> ImageRefs {
        let base = format!("{}/{}", self.registry(), self.repository);
        ImageRefs {
            commit: format!("{}:{}", base, self.commit_sha),
            latest: format!("{}:{}", base, LATEST_TAG),
        }
    }

    /// HTTPS only when both the domain and its hosted zone are known.
    pub fn listener_mode(&self) -> ListenerMode {
        match (&self.domain_name, &self.hosted_zone_id) {
            (Some(domain), Some(zone)) => ListenerMode::Https {
                domain: domain.clone(),
                hosted_zone_id: zone.clone(),
                certificate_arn: self.certificate_arn.clone(),
            },
            _ => ListenerMode::Http,
        }
    }

    pub fn service_spec(&self) -> ServiceSpec {
        ServiceSpec {
            image: self
                .container_image
                .clone()
                .unwrap_or_else(|| self.image_refs().commit),
            container_port: CONTAINER_PORT,
            cpu_units: 1024,
            memory_mib: 2048,
            health_check: HealthCheck {
                path: HEALTH_CHECK_PATH,
                port: CONTAINER_PORT,
                interval_secs: 60,
                timeout_secs: 30,
            },
            scaling: Scaling {
                min_tasks: 1,
                max_tasks: 5,
                target_cpu_percent: 70,
                scale_in_cooldown_secs: 300,
                scale_out_cooldown_secs: 60,
            },
            listener: self.listener_mode(),
        }
    }

    pub fn plan(&self, stack: StackKind) -> DeploymentPlan {
        let (service, redeploy) = match stack {
            StackKind::Registry => (None, None),
            StackKind::Service => (
                Some(self.service_spec()),
                Some(RedeployTarget {
                    cluster: self.cluster_name.clone(),
                    service: self.service_name.clone(),
                    force_new_deployment: true,
                }),
            ),
        };

        DeploymentPlan {
            stack,
            region: self.region.clone(),
            repository: self.repository.clone(),
            images: self.image_refs(),
            service,
            redeploy,
        }
    }
}

impl Validate for DeploymentConfig {
    fn validate(&self) -> Result<()> {
        if self.account.len() != 12 || !self.account.chars().all(|c| c.is_ascii_digit()) {
            return Err(TrackerError::InvalidConfigValueError {
                field: "CDK_DEFAULT_ACCOUNT".to_string(),
                value: self.account.clone(),
                reason: "account id must be 12 digits".to_string(),
            });
        }
        validation::validate_aws_region("CDK_DEFAULT_REGION", &self.region)?;
        validation::validate_repository_name("ECR_REPOSITORY_NAME", &self.repository)?;
        validation::validate_image_tag("GITHUB_SHA", &self.commit_sha)?;
        validation::validate_non_empty_string("ECS_CLUSTER_NAME", &self.cluster_name)?;
        validation::validate_non_empty_string("ECS_SERVICE_NAME", &self.service_name)?;

        match (&self.domain_name, &self.hosted_zone_id) {
            (Some(domain), Some(_)) => validation::validate_domain_name("DOMAIN_NAME", domain)?,
            (Some(_), None) => {
                return Err(TrackerError::MissingConfigError {
                    field: "HOSTED_ZONE_ID".to_string(),
                })
            }
            (None, Some(_)) => {
                return Err(TrackerError::MissingConfigError {
                    field: "DOMAIN_NAME".to_string(),
                })
            }
            (None, None) => {}
        }

        if let Some(arn) = &self.certificate_arn {
            if !arn.starts_with("arn:") {
                return Err(TrackerError::InvalidConfigValueError {
                    field: "CERTIFICATE_ARN".to_string(),
                    value: arn.clone(),
                    reason: "expected an ARN".to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(extra: &[(&str, &str)]) -> Result<DeploymentConfig> {
        let mut env: HashMap<&str, &str> = HashMap::from([
            ("CDK_DEFAULT_ACCOUNT", "123456789012"),
            ("GITHUB_SHA", "3f2c1a9e8b7d6c5f4e3d2c1b0a9f8e7d6c5b4a39"),
        ]);
        env.extend(extra.iter().copied());
        DeploymentConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.repository, "stock-tracker");
        assert_eq!(config.listener_mode(), ListenerMode::Http);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_image_refs_use_commit_and_latest() {
        let refs = load(&[("CDK_DEFAULT_REGION", "eu-west-1")]).unwrap().image_refs();
        assert_eq!(
            refs.commit,
            "123456789012.dkr.ecr.eu-west-1.amazonaws.com/stock-tracker:3f2c1a9e8b7d6c5f4e3d2c1b0a9f8e7d6c5b4a39"
        );
        assert_eq!(
            refs.latest,
            "123456789012.dkr.ecr.eu-west-1.amazonaws.com/stock-tracker:latest"
        );
    }

    #[test]
    fn test_empty_optional_values_are_unset() {
        let config = load(&[("DOMAIN_NAME", ""), ("HOSTED_ZONE_ID", "  ")]).unwrap();
        assert!(config.domain_name.is_none());
        assert_eq!(config.listener_mode(), ListenerMode::Http);
    }

    #[test]
    fn test_https_needs_domain_and_zone() {
        let config = load(&[
            ("DOMAIN_NAME", "stocks.example.com"),
            ("HOSTED_ZONE_ID", "Z0123456789ABC"),
        ])
        .unwrap();
        assert!(matches!(
            config.listener_mode(),
            ListenerMode::Https { ref domain, .. } if domain == "stocks.example.com"
        ));
        assert!(config.validate().is_ok());

        let half = load(&[("DOMAIN_NAME", "stocks.example.com")]).unwrap();
        assert_eq!(half.listener_mode(), ListenerMode::Http);
        assert!(half.validate().is_err());
    }

    #[test]
    fn test_stack_selection() {
        assert_eq!("ecr".parse::<StackKind>().unwrap(), StackKind::Registry);
        assert_eq!("Service".parse::<StackKind>().unwrap(), StackKind::Service);
        assert!("database".parse::<StackKind>().is_err());
    }

    #[test]
    fn test_service_plan_carries_redeploy_target() {
        let config = load(&[
            ("ECS_CLUSTER_NAME", "prod"),
            ("ECS_SERVICE_NAME", "dashboard"),
        ])
        .unwrap();

        let registry = config.plan(StackKind::Registry);
        assert!(registry.service.is_none());
        assert!(registry.redeploy.is_none());

        let plan = config.plan(StackKind::Service);
        let service = plan.service.as_ref().unwrap();
        assert_eq!(service.container_port, 8501);
        assert_eq!(service.health_check.path, "/healthz");
        assert_eq!(service.scaling.max_tasks, 5);
        assert_eq!(service.image, config.image_refs().commit);
        assert_eq!(
            plan.redeploy,
            Some(RedeployTarget {
                cluster: "prod".to_string(),
                service: "dashboard".to_string(),
                force_new_deployment: true,
            })
        );

        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["stack"], "service");
        assert_eq!(json["service"]["listener"]["protocol"], "http");
    }

    /// Fields read by scripts/deploy.sh.
    #[test]
    fn test_plan_json_fields_used_by_deploy_script() {
        let config = load(&[]).unwrap();

        let registry = serde_json::to_value(config.plan(StackKind::Registry)).unwrap();
        for key in ["region", "repository"] {
            assert!(registry[key].is_string(), "missing {}", key);
        }
        assert!(registry["images"]["commit"]
            .as_str()
            .unwrap()
            .ends_with(":3f2c1a9e8b7d6c5f4e3d2c1b0a9f8e7d6c5b4a39"));
        assert!(registry["images"]["latest"]
            .as_str()
            .unwrap()
            .ends_with(":latest"));

        let service = serde_json::to_value(config.plan(StackKind::Service)).unwrap();
        assert_eq!(service["service"]["cpu_units"], 1024);
        assert_eq!(service["service"]["memory_mib"], 2048);
        assert_eq!(service["service"]["container_port"], 8501);
        assert_eq!(service["service"]["health_check"]["port"], 8501);
        assert_eq!(service["service"]["health_check"]["path"], "/healthz");
        assert_eq!(service["service"]["health_check"]["interval_secs"], 60);
        assert_eq!(service["service"]["health_check"]["timeout_secs"], 30);
        assert_eq!(service["redeploy"]["cluster"], "stock-tracker-cluster");
        assert_eq!(service["redeploy"]["service"], "stock-tracker-service");
        assert_eq!(service["redeploy"]["force_new_deployment"], true);
    }

    #[test]
    fn test_missing_account() {
        let err = DeploymentConfig::from_lookup(|_| None).unwrap_err();
        assert!(matches!(
            err,
            TrackerError::MissingConfigError { ref field } if field == "CDK_DEFAULT_ACCOUNT"
        ));
    }
}
