use super::client::BrokerHandle;
use super::error::BrokerError;
use async_trait::async_trait;
use bootstrap_framework::{CreateOutcome, ResourceAdmin, TopicSpec};
use rdkafka::admin::{AdminOptions, NewTopic, TopicReplication, TopicResult};
use rdkafka::types::RDKafkaErrorCode;
use tracing::debug;

#[async_trait]
impl ResourceAdmin for BrokerHandle {
    type Resource = TopicSpec;
    type Error = BrokerError;

    async fn create(&self, topic: &TopicSpec) -> Result<CreateOutcome, BrokerError> {
        let new_topic = NewTopic::new(
            &topic.name,
            topic.partitions,
            TopicReplication::Fixed(topic.replication_factor),
        );
        let options = AdminOptions::new().operation_timeout(Some(self.operation_timeout));

        let mut results = self.admin.create_topics([&new_topic], &options).await?;
        let outcome = topic_outcome(results.pop(), &topic.name)?;
        if outcome == CreateOutcome::Created {
            debug!(topic = %topic.name, partitions = topic.partitions, "Topic created");
        }
        Ok(outcome)
    }
}

/// Maps the admin result for one topic; an existing topic is not an error.
fn topic_outcome(result: Option<TopicResult>, topic: &str) -> Result<CreateOutcome, BrokerError> {
    match result {
        Some(Ok(_)) => Ok(CreateOutcome::Created),
        Some(Err((_, RDKafkaErrorCode::TopicAlreadyExists))) => Ok(CreateOutcome::AlreadyExisted),
        Some(Err((name, code))) => Err(BrokerError::TopicCreation { topic: name, code }),
        None => Err(BrokerError::TopicCreation {
            topic: topic.to_string(),
            code: RDKafkaErrorCode::Fail,
        }),
    }
}
