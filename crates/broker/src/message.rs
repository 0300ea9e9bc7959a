/// A message handed to a consumer, awaiting acknowledgement.
///
/// The `tag` identifies the delivery on the channel it arrived on and is what
/// [`Consumer::ack`](crate::Consumer::ack) and
/// [`Consumer::reject`](crate::Consumer::reject) refer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub tag: u64,
    pub body: Vec<u8>,
    /// True when the broker has handed this message out before.
    pub redelivered: bool,
}

/// Options applied to a single publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Persistent messages survive a broker restart (AMQP delivery mode 2).
    pub persistent: bool,
    pub content_type: Option<String>,
}

impl PublishOptions {
    /// Persistent delivery with an `application/json` content type.
    pub fn persistent_json() -> Self {
        Self {
            persistent: true,
            content_type: Some("application/json".to_string()),
        }
    }
}
