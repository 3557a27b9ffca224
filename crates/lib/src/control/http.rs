//! REST client for the controller API.
//!
//! Packages live under `/v2/packages` and functions under `/v2/functions`.
//! Reads and deletes address one object as `/<kind>/<name>?namespace=<ns>`;
//! creates POST the whole object to the collection; updates PUT it to its
//! object path.

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::{ControlError, ControlPlane, ResourceKind};
use crate::config::BaseUrl;
use crate::consts::STORAGE_SERVICE_SELECTOR;
use crate::types::{Function, ObjectMeta, Package};

const PACKAGES_PATH: &str = "/v2/packages";
const FUNCTIONS_PATH: &str = "/v2/functions";
const SERVICES_PATH: &str = "/v2/svcs";

/// Request verb, which decides how a 409 answer is read.
#[derive(Clone, Copy)]
enum Verb {
  Read,
  Create,
  Update,
}

struct Target<'a> {
  kind: ResourceKind,
  namespace: &'a str,
  name: &'a str,
}

#[derive(Debug, Clone)]
pub struct HttpControlPlane {
  client: reqwest::Client,
  server: BaseUrl,
}

impl HttpControlPlane {
  pub fn new(server: BaseUrl) -> Self {
    Self {
      client: reqwest::Client::new(),
      server,
    }
  }

  pub fn server(&self) -> &BaseUrl {
    &self.server
  }

  /// Ask the controller for the storage service address.
  ///
  /// The controller answers with a bare `host:port`.
  pub async fn discover_storage_url(&self) -> Result<BaseUrl, ControlError> {
    let url = self.server.join(SERVICES_PATH);
    let response = self
      .client
      .get(&url)
      .query(&[("selector", STORAGE_SERVICE_SELECTOR)])
      .send()
      .await
      .map_err(|e| request_err(&url, e))?;

    if !response.status().is_success() {
      let status = response.status().as_u16();
      let body = response.text().await.unwrap_or_default();
      return Err(ControlError::HttpStatus { url, status, body });
    }

    let body = response.text().await.map_err(|e| request_err(&url, e))?;
    let address = body.trim();
    let storage = if address.starts_with("http://") || address.starts_with("https://") {
      address.to_string()
    } else {
      format!("http://{}", address)
    };

    let base = BaseUrl::parse(&storage).map_err(|e| ControlError::Decode {
      url: url.clone(),
      message: e.to_string(),
    })?;
    info!(storage = %base, "discovered storage service");
    Ok(base)
  }

  fn collection_url(&self, kind: ResourceKind) -> String {
    match kind {
      ResourceKind::Package => self.server.join(PACKAGES_PATH),
      ResourceKind::Function => self.server.join(FUNCTIONS_PATH),
    }
  }

  fn object_url(&self, kind: ResourceKind, name: &str) -> String {
    format!("{}/{}", self.collection_url(kind), name)
  }

  async fn get_object<T: DeserializeOwned>(&self, target: Target<'_>) -> Result<T, ControlError> {
    let url = self.object_url(target.kind, target.name);
    debug!(url = %url, namespace = %target.namespace, "get");
    let request = self.client.get(&url).query(&[("namespace", target.namespace)]);
    let response = self.send(request, &url, &target, Verb::Read).await?;
    decode(response, &url).await
  }

  async fn list_objects<T: DeserializeOwned>(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<T>, ControlError> {
    let url = self.collection_url(kind);
    debug!(url = %url, namespace = %namespace, "list");
    let request = self.client.get(&url).query(&[("namespace", namespace)]);
    let target = Target {
      kind,
      namespace,
      name: "",
    };
    let response = self.send(request, &url, &target, Verb::Read).await?;
    decode(response, &url).await
  }

  async fn create_object<T: Serialize>(&self, target: Target<'_>, body: &T) -> Result<ObjectMeta, ControlError> {
    let url = self.collection_url(target.kind);
    debug!(url = %url, name = %target.name, namespace = %target.namespace, "create");
    let request = self.client.post(&url).json(body);
    let response = self.send(request, &url, &target, Verb::Create).await?;
    decode(response, &url).await
  }

  async fn update_object<T: Serialize>(&self, target: Target<'_>, body: &T) -> Result<ObjectMeta, ControlError> {
    let url = self.object_url(target.kind, target.name);
    debug!(url = %url, namespace = %target.namespace, "update");
    let request = self.client.put(&url).json(body);
    let response = self.send(request, &url, &target, Verb::Update).await?;
    decode(response, &url).await
  }

  async fn delete_object(&self, target: Target<'_>) -> Result<(), ControlError> {
    let url = self.object_url(target.kind, target.name);
    debug!(url = %url, namespace = %target.namespace, "delete");
    let request = self.client.delete(&url).query(&[("namespace", target.namespace)]);
    self.send(request, &url, &target, Verb::Read).await?;
    Ok(())
  }

  async fn send(
    &self,
    request: RequestBuilder,
    url: &str,
    target: &Target<'_>,
    verb: Verb,
  ) -> Result<Response, ControlError> {
    let response = request.send().await.map_err(|e| request_err(url, e))?;
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let body = response.text().await.unwrap_or_default().trim().to_string();
    let namespace = target.namespace.to_string();
    let name = target.name.to_string();

    Err(match (status, verb) {
      (StatusCode::NOT_FOUND, _) if !target.name.is_empty() => ControlError::NotFound {
        kind: target.kind,
        namespace,
        name,
      },
      (StatusCode::CONFLICT, Verb::Create) => ControlError::AlreadyExists {
        kind: target.kind,
        namespace,
        name,
      },
      (StatusCode::CONFLICT, Verb::Update) => ControlError::Conflict {
        kind: target.kind,
        namespace,
        name,
        message: body,
      },
      _ => ControlError::HttpStatus {
        url: url.to_string(),
        status: status.as_u16(),
        body,
      },
    })
  }
}

fn request_err(url: &str, e: reqwest::Error) -> ControlError {
  ControlError::Request {
    url: url.to_string(),
    message: e.to_string(),
  }
}

async fn decode<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, ControlError> {
  response.json().await.map_err(|e| ControlError::Decode {
    url: url.to_string(),
    message: e.to_string(),
  })
}

impl ControlPlane for HttpControlPlane {
  async fn get_package(&self, namespace: &str, name: &str) -> Result<Package, ControlError> {
    self
      .get_object(Target {
        kind: ResourceKind::Package,
        namespace,
        name,
      })
      .await
  }

  async fn create_package(&self, package: &Package) -> Result<ObjectMeta, ControlError> {
    let target = Target {
      kind: ResourceKind::Package,
      namespace: &package.metadata.namespace,
      name: &package.metadata.name,
    };
    self.create_object(target, package).await
  }

  async fn update_package(&self, package: &Package) -> Result<ObjectMeta, ControlError> {
    let target = Target {
      kind: ResourceKind::Package,
      namespace: &package.metadata.namespace,
      name: &package.metadata.name,
    };
    self.update_object(target, package).await
  }

  async fn delete_package(&self, namespace: &str, name: &str) -> Result<(), ControlError> {
    self
      .delete_object(Target {
        kind: ResourceKind::Package,
        namespace,
        name,
      })
      .await
  }

  async fn list_packages(&self, namespace: &str) -> Result<Vec<Package>, ControlError> {
    self.list_objects(ResourceKind::Package, namespace).await
  }

  async fn get_function(&self, namespace: &str, name: &str) -> Result<Function, ControlError> {
    self
      .get_object(Target {
        kind: ResourceKind::Function,
        namespace,
        name,
      })
      .await
  }

  async fn create_function(&self, function: &Function) -> Result<ObjectMeta, ControlError> {
    let target = Target {
      kind: ResourceKind::Function,
      namespace: &function.metadata.namespace,
      name: &function.metadata.name,
    };
    self.create_object(target, function).await
  }

  async fn update_function(&self, function: &Function) -> Result<ObjectMeta, ControlError> {
    let target = Target {
      kind: ResourceKind::Function,
      namespace: &function.metadata.namespace,
      name: &function.metadata.name,
    };
    self.update_object(target, function).await
  }

  async fn delete_function(&self, namespace: &str, name: &str) -> Result<(), ControlError> {
    self
      .delete_object(Target {
        kind: ResourceKind::Function,
        namespace,
        name,
      })
      .await
  }

  async fn list_functions(&self, namespace: &str) -> Result<Vec<Function>, ControlError> {
    self.list_objects(ResourceKind::Function, namespace).await
  }
}
