use crate::error::FactoryError;
use crate::fee_token::FeeToken;
use chrono::Utc;
use configuration::{EngineSettings, FactorySettings};
use core_types::{AccountId, Asset, FundId};
use engine::{Fund, FundIdentity, FundState, ProportionTable};
use events::{EventSender, FundEvent, publish};
use oracle::{OracleError, PriceOracle};
use router::SwapRouter;
use std::sync::Arc;
use tokio::sync::RwLock;

const MAX_TICKER_LEN: usize = 11;

#[derive(Default)]
struct Registry {
    funds: Vec<Fund>,
    fees_collected: u128,
}

/// Mints new funds for a fee and keeps track of every fund it created.
pub struct FundFactory {
    settings: FactorySettings,
    engine_settings: EngineSettings,
    oracle: Arc<dyn PriceOracle>,
    router: Arc<dyn SwapRouter>,
    fee_token: Arc<FeeToken>,
    registry: RwLock<Registry>,
    events: Option<EventSender>,
}

impl FundFactory {
    pub fn new(
        settings: FactorySettings,
        engine_settings: EngineSettings,
        oracle: Arc<dyn PriceOracle>,
        router: Arc<dyn SwapRouter>,
        fee_token: Arc<FeeToken>,
    ) -> Self {
        Self {
            settings,
            engine_settings,
            oracle,
            router,
            fee_token,
            registry: RwLock::new(Registry::default()),
            events: None,
        }
    }

    /// Publishes `FundCreated` and hands `sender` to every fund created after this.
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn settings(&self) -> &FactorySettings {
        &self.settings
    }

    pub fn fee_token(&self) -> &Arc<FeeToken> {
        &self.fee_token
    }

    /// Creates and registers a new fund owned by `creator`.
    ///
    /// The fee is only charged once the definition is known to be valid, so a
    /// rejected fund costs nothing.
    pub async fn create_fund(
        &self,
        name: &str,
        ticker: &str,
        assets: &[Asset],
        weights: &[u8],
        creator: &AccountId,
    ) -> Result<Fund, FactoryError> {
        let name = name.trim();
        let ticker = ticker.trim();
        validate_name_and_ticker(name, ticker)?;
        let table = ProportionTable::new(assets, weights)?;

        // Every asset the fund can trade must be priceable from day one.
        for asset in assets.iter().chain(std::iter::once(&self.settings.base_asset)) {
            let quote = self.oracle.get_price(asset).await?;
            if quote.price == 0 {
                return Err(FactoryError::Oracle(OracleError::InvalidPrice(
                    asset.clone(),
                    "oracle reports a zero price".to_string(),
                )));
            }
        }

        // The registry lock is held across the fee transfer so two creations
        // cannot claim the same ticker.
        let mut registry = self.registry.write().await;
        if registry
            .funds
            .iter()
            .any(|f| f.fund_ticker().eq_ignore_ascii_case(ticker))
        {
            return Err(FactoryError::InvalidFund(format!(
                "ticker {ticker} is already taken"
            )));
        }

        let fee = u128::from(self.settings.creation_fee);
        self.fee_token
            .transfer(creator, &self.settings.treasury, fee)
            .await?;
        registry.fees_collected = registry.fees_collected.saturating_add(fee);

        let identity = FundIdentity {
            id: FundId::new(),
            name: name.to_string(),
            ticker: ticker.to_uppercase(),
            creator: creator.clone(),
            created_at: Utc::now(),
        };
        let state = FundState::new(identity, self.settings.base_asset.clone(), table);
        let mut fund = Fund::new(
            state,
            Arc::clone(&self.oracle),
            Arc::clone(&self.router),
            self.engine_settings.clone(),
        );
        if let Some(sender) = &self.events {
            fund = fund.with_events(sender.clone());
        }
        registry.funds.push(fund.clone());
        drop(registry);

        tracing::info!(
            fund = %fund.id(), name = fund.fund_name(), ticker = fund.fund_ticker(),
            %creator, fee, "Fund created"
        );
        publish(
            self.events.as_ref(),
            FundEvent::FundCreated {
                fund: fund.id(),
                name: fund.fund_name().to_string(),
                ticker: fund.fund_ticker().to_string(),
                creator: creator.clone(),
                fee_paid: fee,
                timestamp: Utc::now(),
            },
        );
        Ok(fund)
    }

    pub async fn fund(&self, id: FundId) -> Option<Fund> {
        self.registry
            .read()
            .await
            .funds
            .iter()
            .find(|f| f.id() == id)
            .cloned()
    }

    /// Every fund in creation order.
    pub async fn funds(&self) -> Vec<Fund> {
        self.registry.read().await.funds.clone()
    }

    pub async fn funds_by_creator(&self, creator: &AccountId) -> Vec<Fund> {
        self.registry
            .read()
            .await
            .funds
            .iter()
            .filter(|f| f.creator() == creator)
            .cloned()
            .collect()
    }

    pub async fn fees_collected(&self) -> u128 {
        self.registry.read().await.fees_collected
    }
}

fn validate_name_and_ticker(name: &str, ticker: &str) -> Result<(), FactoryError> {
    if name.is_empty() {
        return Err(FactoryError::InvalidFund("name must not be empty".to_string()));
    }
    if ticker.is_empty() || ticker.len() > MAX_TICKER_LEN {
        return Err(FactoryError::InvalidFund(format!(
            "ticker must be 1 to {MAX_TICKER_LEN} characters"
        )));
    }
    if !ticker.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(FactoryError::InvalidFund(format!(
            "ticker {ticker} must be alphanumeric"
        )));
    }
    Ok(())
}
