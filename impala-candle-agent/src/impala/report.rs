use impala_core::{
    record::{Record, RecordValue},
    stats::Describe,
};

/// Summary of one learning step.
#[derive(Debug, Clone, PartialEq)]
pub struct LearnReport {
    /// Total loss.
    pub loss: f32,

    /// Mean of `-logp * A`.
    pub policy_loss: f32,

    /// Mean of `-H`.
    pub entropy_loss: f32,

    /// Mean entropy of the policy.
    pub policy_entropy: f32,

    /// Mean of `(V - vs)^2`.
    pub value_loss: f32,

    /// Global gradient norm before clipping.
    pub grad_norm: f32,

    /// Fraction of the variance of `vs` explained by `V`.
    pub explained_variance: f32,

    /// Distribution of `V` over the batch.
    pub value: Option<Describe>,

    /// Mean importance weight clipped at `clip_rho`.
    pub mean_rho: f32,

    /// Learning rate set for the next step, if scheduled.
    pub current_lr: Option<f64>,

    /// Environment steps consumed so far, including this batch.
    pub total_timestep: usize,
}

impl LearnReport {
    /// Converts the report into a [`Record`].
    pub fn to_record(&self) -> Record {
        let mut record = Record::from_slice(&[
            ("loss", RecordValue::Scalar(self.loss)),
            ("policy_loss", RecordValue::Scalar(self.policy_loss)),
            ("entropy_loss", RecordValue::Scalar(self.entropy_loss)),
            ("policy_entropy", RecordValue::Scalar(self.policy_entropy)),
            ("value_loss", RecordValue::Scalar(self.value_loss)),
            ("grad_norm", RecordValue::Scalar(self.grad_norm)),
            (
                "explained_variance",
                RecordValue::Scalar(self.explained_variance),
            ),
            ("mean_rho", RecordValue::Scalar(self.mean_rho)),
            (
                "total_timestep",
                RecordValue::Scalar(self.total_timestep as f32),
            ),
        ]);
        if let Some(lr) = self.current_lr {
            record.insert("current_lr", RecordValue::Scalar(lr as f32));
        }
        if let Some(v) = &self.value {
            record.insert("V", RecordValue::String(v.to_string()));
            record.insert("V_mean", RecordValue::Scalar(v.mean));
        }
        record
    }
}
