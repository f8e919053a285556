use std::fmt::Display;

/// Logical service images a testbed can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceImage {
    Mongo,
    Redis,
    Zookeeper,
    Kafka,
}

impl ServiceImage {
    /// Trims and lower-cases `name` before matching.
    pub fn parse(name: &str) -> Option<ServiceImage> {
        match name.trim().to_lowercase().as_str() {
            "mongo" => Some(Self::Mongo),
            "redis" => Some(Self::Redis),
            "zookeeper" => Some(Self::Zookeeper),
            "kafka" => Some(Self::Kafka),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Mongo => "mongo",
            Self::Redis => "redis",
            Self::Zookeeper => "zookeeper",
            Self::Kafka => "kafka",
        }
    }

    /// Port the service listens on inside its container, in docker's `port/proto` form.
    pub fn internal_port(&self) -> &'static str {
        match *self {
            Self::Mongo => "27017/tcp",
            Self::Redis => "6379/tcp",
            Self::Zookeeper => "2181/tcp",
            Self::Kafka => "9092/tcp",
        }
    }

    /// Only mongo and redis are provisioned, the rest are recognized and skipped.
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Mongo | Self::Redis)
    }

    pub fn reference(&self, registry: &str) -> String {
        format!("{}{}:latest", registry, self.as_str())
    }
}

impl Display for ServiceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returns the supported image for a stored record name, if any.
pub fn supported_image(name: &str) -> Option<ServiceImage> {
    ServiceImage::parse(name).filter(ServiceImage::is_supported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_and_whitespace_insensitive() {
        assert_eq!(ServiceImage::parse(" Mongo "), Some(ServiceImage::Mongo));
        assert_eq!(ServiceImage::parse("REDIS"), Some(ServiceImage::Redis));
        assert_eq!(ServiceImage::parse("postgres"), None);
    }

    #[test]
    fn internal_ports_follow_the_image_table() {
        assert_eq!(ServiceImage::Mongo.internal_port(), "27017/tcp");
        assert_eq!(ServiceImage::Redis.internal_port(), "6379/tcp");
        assert_eq!(ServiceImage::Zookeeper.internal_port(), "2181/tcp");
        assert_eq!(ServiceImage::Kafka.internal_port(), "9092/tcp");
    }

    #[test]
    fn only_mongo_and_redis_are_supported() {
        assert!(supported_image("mongo").is_some());
        assert!(supported_image("redis").is_some());
        assert!(supported_image("kafka").is_none());
        assert!(supported_image("zookeeper").is_none());
        assert!(supported_image("nginx").is_none());
    }

    #[test]
    fn reference_prefixes_registry() {
        assert_eq!(
            ServiceImage::Redis.reference("docker.io/library/"),
            "docker.io/library/redis:latest"
        );
    }
}
