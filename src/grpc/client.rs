use crate::dispatch::job::Cohort;
use crate::error::AppError;
use std::collections::{HashMap, HashSet};
use tracing::info;
use yellowstone_grpc_client::GeyserGrpcClient;
use yellowstone_grpc_proto::geyser::{SubscribeRequest, SubscribeRequestFilterTransactions};
use yellowstone_grpc_proto::prelude::CommitmentLevel;

/// Yellowstone gRPC connection settings for one cohort's subscription.
///
/// Whales and KOLs each get their own subscription so that a refresh of one
/// cohort's wallet list only resubscribes that cohort's stream. The struct
/// holds only settings; a fresh client is built on every (re)connect.
#[derive(Debug, Clone)]
pub struct GeyserSubscription {
    cohort: Cohort,
    grpc_endpoint: String,
    auth_token: String,
    include_failed: bool,
}

impl GeyserSubscription {
    /// Create the settings for a cohort's subscription.
    ///
    /// The endpoint should be in the format `https://host:port`;
    /// authentication goes in the x-token header. `include_failed` keeps
    /// failed transactions in the feed so they can be erased and counted.
    pub fn new(cohort: Cohort, grpc_endpoint: String, auth_token: String, include_failed: bool) -> Self {
        info!(
            cohort = %cohort,
            grpc_endpoint = %grpc_endpoint,
            "Creating Yellowstone gRPC subscription"
        );
        Self {
            cohort,
            grpc_endpoint,
            auth_token,
            include_failed,
        }
    }

    pub fn cohort(&self) -> Cohort {
        self.cohort
    }

    /// Connect to the gRPC endpoint and return a configured Yellowstone client.
    ///
    /// Errors here are connection-level and are retried with backoff by the
    /// stream handler.
    pub async fn connect(&self) -> Result<GeyserGrpcClient<impl tonic::service::Interceptor>, AppError> {
        info!(
            cohort = %self.cohort,
            grpc_endpoint = %self.grpc_endpoint,
            "Connecting to Yellowstone gRPC endpoint"
        );

        // Connect with x-token authentication
        let client = GeyserGrpcClient::build_from_shared(self.grpc_endpoint.clone())
            .map_err(|e| AppError::GrpcConnection(format!("Invalid gRPC endpoint: {}", e)))?
            .x_token(Some(self.auth_token.clone()))
            .map_err(|e| AppError::Config(format!("Invalid auth token: {}", e)))?
            .connect()
            .await
            .map_err(|e| AppError::GrpcConnection(format!("Failed to connect to gRPC endpoint: {}", e)))?;

        info!(cohort = %self.cohort, "Connected to Yellowstone gRPC endpoint");

        Ok(client)
    }

    /// Build the subscription request for the cohort's current address set.
    ///
    /// The request matches every non-vote transaction that includes any of
    /// `addresses` as an account. Addresses are sorted so the same snapshot
    /// always produces the same request. Callers must not pass an empty set:
    /// an empty `account_include` matches every transaction on chain.
    pub fn create_subscription_request(&self, addresses: &HashSet<String>) -> SubscribeRequest {
        let mut account_include: Vec<String> = addresses.iter().cloned().collect();
        account_include.sort();

        let mut transactions = HashMap::new();
        transactions.insert(
            format!("{}_transactions", self.cohort.as_str()),
            SubscribeRequestFilterTransactions {
                vote: Some(false), // Exclude vote transactions
                failed: if self.include_failed { None } else { Some(false) },
                account_include,
                ..Default::default()
            },
        );

        SubscribeRequest {
            transactions,
            commitment: Some(CommitmentLevel::Confirmed as i32),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_filters_on_cohort_addresses() {
        let subscription = GeyserSubscription::new(
            Cohort::Kol,
            "https://grpc.example.com".to_string(),
            "token".to_string(),
            false,
        );
        let addresses = HashSet::from(["B".to_string(), "A".to_string()]);
        let request = subscription.create_subscription_request(&addresses);

        let filter = &request.transactions["kol_transactions"];
        assert_eq!(filter.account_include, vec!["A", "B"]);
        assert_eq!(filter.vote, Some(false));
        assert_eq!(filter.failed, Some(false));
        assert_eq!(request.commitment, Some(CommitmentLevel::Confirmed as i32));
    }

    #[test]
    fn failed_transactions_are_kept_when_requested() {
        let subscription = GeyserSubscription::new(
            Cohort::Whale,
            "https://grpc.example.com".to_string(),
            "token".to_string(),
            true,
        );
        let request = subscription.create_subscription_request(&HashSet::from(["A".to_string()]));
        assert_eq!(request.transactions["whale_transactions"].failed, None);
    }
}
