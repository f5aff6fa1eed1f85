//! Product creation: pin the image, then create the listing.

use std::sync::Arc;

use market_gateway::{ImageFile, ImageHost, Receipt};
use market_types::{ActionKind, EntityKey, Wei};

use crate::action::Action;
use crate::catalog::Catalog;
use crate::error::ClientError;
use crate::known_state::KnownState;
use crate::lifecycle::LifecycleController;
use crate::session::Session;

/// Where the listing image comes from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ImageSource {
    #[default]
    None,
    /// An already hosted image.
    Url(String),
    /// A local file, pinned before the listing is created.
    File(ImageFile),
}

/// User input for a new listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub product_url: String,
    pub image: ImageSource,
}

impl ProductDraft {
    fn to_action(&self, image_url: String, fee: Wei) -> Action {
        Action::CreateProduct {
            name: self.name.clone(),
            description: self.description.clone(),
            image_url,
            product_url: self.product_url.clone(),
            fee,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedProduct {
    pub receipt: Receipt,
    pub image_url: String,
    pub fee: Wei,
}

pub struct ProductPublisher {
    lifecycle: LifecycleController,
    catalog: Arc<Catalog>,
    images: Arc<dyn ImageHost>,
    fee_override: Option<Wei>,
}

impl ProductPublisher {
    pub fn new(
        lifecycle: LifecycleController,
        catalog: Arc<Catalog>,
        images: Arc<dyn ImageHost>,
    ) -> Self {
        Self {
            lifecycle,
            catalog,
            images,
            fee_override: None,
        }
    }

    /// Use `fee` instead of reading the listing fee from the contract.
    pub fn with_fee(mut self, fee: Option<Wei>) -> Self {
        self.fee_override = fee;
        self
    }

    /// Validate the draft, pin its image if it has a file, and create the
    /// listing. Nothing is uploaded unless the draft passes local checks.
    pub async fn publish(
        &self,
        session: &Session,
        draft: &ProductDraft,
    ) -> Result<PublishedProduct, ClientError> {
        let account = session.require_account()?;
        self.lifecycle
            .can_begin(&EntityKey::Catalog(account), ActionKind::CreateProduct)?;

        let fee = match self.fee_override {
            Some(fee) => fee,
            None => self.catalog.creation_fee().await?,
        };
        let hosted = match &draft.image {
            ImageSource::Url(url) => url.trim().to_string(),
            _ => String::new(),
        };
        draft
            .to_action(hosted.clone(), fee)
            .validate(self.lifecycle.rules())?;

        let image_url = match &draft.image {
            ImageSource::File(file) => {
                let cid = self.images.upload(file).await?;
                self.images.content_url(&cid)?
            }
            _ => hosted,
        };

        let receipt = self
            .lifecycle
            .execute(
                session,
                draft.to_action(image_url.clone(), fee),
                &KnownState::unknown(),
            )
            .await?;
        Ok(PublishedProduct {
            receipt,
            image_url,
            fee,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_gateway::ContractGateway;
    use market_nullables::{NullGateway, NullImageHost};
    use market_types::Address;

    fn setup(gateway: Arc<NullGateway>, images: Arc<NullImageHost>) -> ProductPublisher {
        let catalog = Arc::new(Catalog::new(gateway.clone()));
        let lifecycle = LifecycleController::new(gateway, catalog.clone());
        ProductPublisher::new(lifecycle, catalog, images)
    }

    fn draft(image: ImageSource) -> ProductDraft {
        ProductDraft {
            name: "Ledger Lens".into(),
            description: "Block explorer".into(),
            product_url: "https://lens.example".into(),
            image,
        }
    }

    #[tokio::test]
    async fn pins_file_then_creates_listing() {
        let gateway = Arc::new(NullGateway::new());
        let images = Arc::new(NullImageHost::new());
        let publisher = setup(gateway.clone(), images.clone());
        let owner = Address::new([5; 20]);

        let published = publisher
            .publish(
                &Session::connected(owner),
                &draft(ImageSource::File(ImageFile::new("lens.png", vec![1, 2, 3]))),
            )
            .await
            .unwrap();

        assert_eq!(images.upload_count(), 1);
        assert_eq!(published.image_url, "https://ipfs.null/ipfs/bafynull1");
        assert_eq!(published.fee, Wei::new(1_000_000_000_000_000));
        let products = gateway.user_products(&owner).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].image_url, published.image_url);
    }

    #[tokio::test]
    async fn invalid_draft_uploads_nothing() {
        let gateway = Arc::new(NullGateway::new());
        let images = Arc::new(NullImageHost::new());
        let publisher = setup(gateway.clone(), images.clone());
        let mut bad = draft(ImageSource::File(ImageFile::new("lens.png", vec![1])));
        bad.product_url = "lens.example".into();

        let err = publisher
            .publish(&Session::connected(Address::new([5; 20])), &bad)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(images.upload_count(), 0);
        assert_eq!(gateway.submit_count(), 0);
    }

    #[tokio::test]
    async fn failed_upload_creates_no_record() {
        let gateway = Arc::new(NullGateway::new());
        let images = Arc::new(NullImageHost::new());
        images.fail_uploads(market_gateway::GatewayError::Upload("quota".into()));
        let publisher = setup(gateway.clone(), images);

        let err = publisher
            .publish(
                &Session::connected(Address::new([5; 20])),
                &draft(ImageSource::File(ImageFile::new("lens.png", vec![1]))),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Gateway(_)));
        assert_eq!(gateway.submit_count(), 0);
        assert!(publisher.lifecycle.records().is_empty());
    }

    #[tokio::test]
    async fn settled_listing_blocks_repeat_before_any_upload() {
        let gateway = Arc::new(NullGateway::new());
        let images = Arc::new(NullImageHost::new());
        let publisher = setup(gateway.clone(), images.clone());
        let session = Session::connected(Address::new([5; 20]));
        let draft = draft(ImageSource::File(ImageFile::new("lens.png", vec![1, 2])));

        publisher.publish(&session, &draft).await.unwrap();
        let reads = gateway.read_count();

        let err = publisher.publish(&session, &draft).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::ResetRequired {
                kind: ActionKind::CreateProduct,
                ..
            }
        ));
        assert_eq!(images.upload_count(), 1);
        assert_eq!(gateway.submit_count(), 1);
        assert_eq!(gateway.read_count(), reads);
    }

    #[tokio::test]
    async fn requires_wallet() {
        let publisher = setup(Arc::new(NullGateway::new()), Arc::new(NullImageHost::new()));
        let err = publisher
            .publish(&Session::disconnected(), &draft(ImageSource::None))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::AuthRequired));
    }
}
