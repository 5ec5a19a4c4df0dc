
use crate::versionbits::{ActiveMode, Deployment, DeploymentPos};
use crate::{ChainSpec, Params, SpecError};
use std::collections::HashMap;

fn dummy_deployment() -> Deployment {
    Deployment {
        bit: 1,
        start: 100,
        timeout: 300,
        min_activation_height: 400,
        period: 50,
        threshold: 40,
        active_mode: ActiveMode::Normal,
        lock_in_on_timeout: false,
    }
}

fn spec_with(deployments: HashMap<DeploymentPos, Deployment>) -> ChainSpec {
    ChainSpec {
        name: "test".to_owned(),
        params: Params { deployments },
    }
}

#[test]
fn chain_spec_from_toml() {
    let spec: ChainSpec = toml::from_str(
        r#"
            name = "braid-dev"

            [params.deployments.testdummy]
            bit = 1
            start = 100
            timeout = 300
            min_activation_height = 400
            period = 50
            threshold = 40
            lock_in_on_timeout = true
        "#,
    )
    .expect("spec toml");

    assert_eq!(spec.name, "braid-dev");
    let deployment = &spec.params.deployments[&DeploymentPos::Testdummy];
    assert_eq!(deployment.bit, 1);
    assert_eq!(deployment.start, 100);
    assert_eq!(deployment.timeout, 300);
    assert_eq!(deployment.min_activation_height, 400);
    assert_eq!(deployment.period, 50);
    assert_eq!(deployment.threshold, 40);
    assert_eq!(deployment.active_mode, ActiveMode::Normal);
    assert!(deployment.lock_in_on_timeout);

    let consensus = spec.build_consensus().expect("valid spec");
    assert_eq!(consensus.id, "braid-dev");
    assert_eq!(
        consensus.versionbits_mask(DeploymentPos::Testdummy),
        Some(0b10)
    );
}

#[test]
fn rejects_out_of_range_bit() {
    let mut deployments = HashMap::new();
    deployments.insert(
        DeploymentPos::Testdummy,
        Deployment {
            bit: 29,
            ..dummy_deployment()
        },
    );

    assert_eq!(
        spec_with(deployments).build_consensus().unwrap_err(),
        SpecError::InvalidDeploymentBit {
            pos: DeploymentPos::Testdummy,
            bit: 29,
        }
    );
}

#[test]
fn rejects_duplicate_bits() {
    let mut deployments = HashMap::new();
    deployments.insert(DeploymentPos::Testdummy, dummy_deployment());
    deployments.insert(DeploymentPos::LightClient, dummy_deployment());

    assert_eq!(
        spec_with(deployments).build_consensus().unwrap_err(),
        SpecError::DuplicateDeploymentBit { bit: 1 }
    );
}

#[test]
fn rejects_zero_period() {
    let mut deployments = HashMap::new();
    deployments.insert(
        DeploymentPos::Testdummy,
        Deployment {
            period: 0,
            threshold: 0,
            ..dummy_deployment()
        },
    );

    assert_eq!(
        spec_with(deployments).build_consensus().unwrap_err(),
        SpecError::InvalidDeploymentPeriod {
            pos: DeploymentPos::Testdummy,
        }
    );
}

#[test]
fn rejects_unreachable_threshold() {
    let mut deployments = HashMap::new();
    deployments.insert(
        DeploymentPos::Testdummy,
        Deployment {
            period: 50,
            threshold: 51,
            ..dummy_deployment()
        },
    );

    assert_eq!(
        spec_with(deployments).build_consensus().unwrap_err(),
        SpecError::InvalidDeploymentThreshold {
            pos: DeploymentPos::Testdummy,
            threshold: 51,
            period: 50,
        }
    );
}
