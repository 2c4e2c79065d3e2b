use k8s_openapi::{
    api::{
        batch::v1::{Job, JobSpec},
        core::v1::{
            Container, HTTPGetAction, PodSpec, PodTemplateSpec, Probe, TopologySpreadConstraint,
        },
    },
    apimachinery::pkg::{
        apis::meta::v1::{LabelSelector, ObjectMeta},
        util::intstr::IntOrString,
    },
};

use crate::config::{jobloader::JobTemplateConfig, OwnerLabel};

/// Pods of a Job are never restarted in place,
/// a failed execution fails the Job.
pub const RESTART_POLICY_NEVER: &str = "Never";
/// Spread is best effort, pods are still scheduled when the skew can't be met.
pub const SCHEDULE_ANYWAY: &str = "ScheduleAnyway";

/// Build the Job created for every unit of the population.
///
/// The name is left to the api-server, only `generateName` is set,
/// so two calls with the same arguments return equal objects.
pub fn build_job(template: &JobTemplateConfig, owner: &OwnerLabel) -> Job {
    Job {
        metadata: ObjectMeta {
            generate_name: Some(template.name_prefix.to_owned()),
            labels: Some(owner.labels()),
            ..Default::default()
        },
        spec: Some(JobSpec {
            parallelism: Some(template.parallelism),
            ttl_seconds_after_finished: Some(template.ttl_seconds_after_finished),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(owner.labels()),
                    ..Default::default()
                }),
                spec: Some(build_pod_spec(template, owner)),
            },
            ..Default::default()
        }),
        status: None,
    }
}

fn build_pod_spec(template: &JobTemplateConfig, owner: &OwnerLabel) -> PodSpec {
    PodSpec {
        restart_policy: Some(RESTART_POLICY_NEVER.to_string()),
        enable_service_links: Some(false),
        automount_service_account_token: Some(false),
        containers: vec![Container {
            name: template.container_name.to_owned(),
            image: Some(template.image.to_owned()),
            command: Some(template.command.to_owned()),
            args: Some(template.args.to_owned()),
            readiness_probe: Some(Probe {
                initial_delay_seconds: Some(template.readiness_initial_delay_seconds),
                period_seconds: Some(template.readiness_period_seconds),
                http_get: Some(HTTPGetAction {
                    host: None,
                    http_headers: None,
                    path: Some(template.readiness_path.to_owned()),
                    port: IntOrString::Int(template.readiness_port),
                    scheme: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        }],
        topology_spread_constraints: Some(vec![TopologySpreadConstraint {
            max_skew: template.max_skew,
            topology_key: template.topology_key.to_owned(),
            when_unsatisfiable: SCHEDULE_ANYWAY.to_string(),
            label_selector: Some(LabelSelector {
                match_labels: Some(owner.labels()),
                match_expressions: None,
            }),
            ..Default::default()
        }]),
        ..Default::default()
    }
}
