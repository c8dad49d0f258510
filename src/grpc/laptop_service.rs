//! gRPC LaptopService implementation.
//!
//! The server's auth layer admits or rejects each call before it reaches
//! these handlers. `CreateLaptop` reads the admitted claims.

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::catalog::{CatalogError, CatalogServices};
use crate::middleware::ClaimsExt;

use super::proto::laptop_service_server::LaptopService;
use super::proto::upload_image_request::Data;
use super::proto::{
    CreateLaptopRequest, CreateLaptopResponse, RateLaptopRequest, RateLaptopResponse,
    SearchLaptopRequest, SearchLaptopResponse, UploadImageRequest, UploadImageResponse,
};

const RESPONSE_BUFFER: usize = 16;
const MIN_SCORE: f64 = 1.0;
const MAX_SCORE: f64 = 10.0;
const MAX_REPORTABLE_SIZE: usize = u32::MAX as usize;

pub struct LaptopServiceImpl {
    catalog: CatalogServices,
    max_image_size: usize,
}

impl LaptopServiceImpl {
    /// `max_image_size` is capped at `u32::MAX`, the largest size the upload
    /// reply can report.
    pub fn new(catalog: CatalogServices, max_image_size: usize) -> Self {
        Self {
            catalog,
            max_image_size: max_image_size.min(MAX_REPORTABLE_SIZE),
        }
    }

    async fn handle_create_laptop(
        &self,
        request: Request<CreateLaptopRequest>,
    ) -> Result<Response<CreateLaptopResponse>, Status> {
        let created_by = request.claims().map(|c| c.username.clone());
        let mut laptop = request
            .into_inner()
            .laptop
            .ok_or_else(|| Status::invalid_argument("laptop is required"))?;

        if laptop.id.is_empty() {
            laptop.id = Uuid::new_v4().to_string();
        } else {
            Uuid::parse_str(&laptop.id).map_err(|_| {
                Status::invalid_argument(format!("laptop id {} is not a valid UUID", laptop.id))
            })?;
        }

        let id = laptop.id.clone();
        self.catalog.laptops.save(laptop).await?;

        info!(laptop_id = %id, created_by = ?created_by, "Laptop created");
        Ok(Response::new(CreateLaptopResponse { id }))
    }

    async fn handle_search_laptop(
        &self,
        request: Request<SearchLaptopRequest>,
    ) -> Result<Response<ReceiverStream<Result<SearchLaptopResponse, Status>>>, Status> {
        let filter = request.into_inner().filter.unwrap_or_default();
        let laptops = self.catalog.laptops.search(&filter).await;
        debug!(matches = laptops.len(), "Laptop search completed");

        let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);
        tokio::spawn(async move {
            for laptop in laptops {
                let response = SearchLaptopResponse {
                    laptop: Some(laptop),
                };
                if tx.send(Ok(response)).await.is_err() {
                    debug!("Search client went away");
                    break;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn handle_upload_image(
        &self,
        request: Request<Streaming<UploadImageRequest>>,
    ) -> Result<Response<UploadImageResponse>, Status> {
        let mut stream = request.into_inner();

        let info = match stream.message().await? {
            Some(UploadImageRequest {
                data: Some(Data::Info(info)),
            }) => info,
            _ => return Err(Status::invalid_argument("first message must carry image info")),
        };

        if !self.catalog.laptops.contains(&info.laptop_id).await {
            return Err(CatalogError::NotFound(info.laptop_id).into());
        }

        let mut image = Vec::new();
        while let Some(message) = stream.message().await? {
            let chunk = match message.data {
                Some(Data::ChunkData(chunk)) => chunk,
                _ => return Err(Status::invalid_argument("expected image chunk")),
            };

            if image.len() + chunk.len() > self.max_image_size {
                warn!(
                    laptop_id = %info.laptop_id,
                    max_image_size = self.max_image_size,
                    "Image upload exceeds size limit"
                );
                return Err(Status::invalid_argument(format!(
                    "image is too large: limit is {} bytes",
                    self.max_image_size
                )));
            }
            image.extend_from_slice(&chunk);
        }

        let size = u32::try_from(image.len())
            .map_err(|_| Status::invalid_argument("image size does not fit in 32 bits"))?;
        let id = self
            .catalog
            .images
            .save(&info.laptop_id, &info.image_type, image)
            .await;

        info!(image_id = %id, laptop_id = %info.laptop_id, size, "Image uploaded");
        Ok(Response::new(UploadImageResponse { id, size }))
    }

    async fn handle_rate_laptop(
        &self,
        request: Request<Streaming<RateLaptopRequest>>,
    ) -> Result<Response<ReceiverStream<Result<RateLaptopResponse, Status>>>, Status> {
        let mut inbound = request.into_inner();
        let catalog = self.catalog.clone();
        let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);

        tokio::spawn(async move {
            loop {
                let req = match inbound.message().await {
                    Ok(Some(req)) => req,
                    Ok(None) => break,
                    Err(status) => {
                        debug!(error = %status, "Rating stream closed with error");
                        break;
                    }
                };

                let reply = rate(&catalog, req).await;
                let failed = reply.is_err();
                if tx.send(reply).await.is_err() || failed {
                    break;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

async fn rate(catalog: &CatalogServices, req: RateLaptopRequest) -> Result<RateLaptopResponse, Status> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&req.score) {
        return Err(CatalogError::InvalidArgument(format!(
            "score must be between {} and {}",
            MIN_SCORE, MAX_SCORE
        ))
        .into());
    }
    if !catalog.laptops.contains(&req.laptop_id).await {
        return Err(CatalogError::NotFound(req.laptop_id).into());
    }

    let rating = catalog.ratings.add(&req.laptop_id, req.score).await;
    Ok(RateLaptopResponse {
        laptop_id: req.laptop_id,
        rated_count: rating.count,
        average_score: rating.average(),
    })
}

#[tonic::async_trait]
impl LaptopService for LaptopServiceImpl {
    #[instrument(skip(self, request))]
    async fn create_laptop(
        &self,
        request: Request<CreateLaptopRequest>,
    ) -> Result<Response<CreateLaptopResponse>, Status> {
        self.handle_create_laptop(request).await
    }

    type SearchLaptopStream = ReceiverStream<Result<SearchLaptopResponse, Status>>;

    #[instrument(skip(self, request))]
    async fn search_laptop(
        &self,
        request: Request<SearchLaptopRequest>,
    ) -> Result<Response<Self::SearchLaptopStream>, Status> {
        self.handle_search_laptop(request).await
    }

    #[instrument(skip(self, request))]
    async fn upload_image(
        &self,
        request: Request<Streaming<UploadImageRequest>>,
    ) -> Result<Response<UploadImageResponse>, Status> {
        self.handle_upload_image(request).await
    }

    type RateLaptopStream = ReceiverStream<Result<RateLaptopResponse, Status>>;

    #[instrument(skip(self, request))]
    async fn rate_laptop(
        &self,
        request: Request<Streaming<RateLaptopRequest>>,
    ) -> Result<Response<Self::RateLaptopStream>, Status> {
        self.handle_rate_laptop(request).await
    }
}
