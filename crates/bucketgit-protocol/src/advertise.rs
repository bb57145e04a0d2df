//! Reference advertisement for `GET /info/refs?service=...`.

use bucketgit_core::object::parse_tag_target;
use bucketgit_core::reference::HEAD;
use bucketgit_core::{Hash, ObjectKind, RefTarget, Result, hash};
use bucketgit_storage::GitStorage;
use bytes::Bytes;
use futures::TryStreamExt;
use tracing::debug;

use crate::pktline::PktWriter;
use crate::service::Service;

/// Annotated tags are peeled through at most this many tag objects.
const MAX_PEEL_DEPTH: usize = 8;

/// One advertised reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedRef {
    pub name: String,
    pub id: Hash,
    /// The non-tag object an annotated tag finally points at.
    pub peeled: Option<Hash>,
}

/// Lists references in advertisement order: sorted by name, HEAD excluded,
/// symbolic references resolved, dangling ones skipped.
pub async fn list_refs(storage: &dyn GitStorage) -> Result<Vec<AdvertisedRef>> {
    let mut refs: Vec<_> = storage.references().try_collect().await?;
    refs.retain(|r| r.name() != HEAD);
    refs.sort_by(|a, b| a.name().cmp(b.name()));

    let mut out = Vec::with_capacity(refs.len());
    for reference in refs {
        let id = match reference.target() {
            RefTarget::Direct(id) => *id,
            RefTarget::Symbolic(_) => match storage.resolve(reference.name()).await {
                Ok(id) => id,
                Err(e) if e.is_not_found() => {
                    debug!(name = %reference.name(), "dangling symbolic reference not advertised");
                    continue;
                },
                Err(e) => return Err(e),
            },
        };
        let peeled = if reference.name().starts_with("refs/tags/") {
            peel(storage, id).await?
        } else {
            None
        };
        out.push(AdvertisedRef {
            name: reference.name().to_string(),
            id,
            peeled,
        });
    }
    Ok(out)
}

/// Follows annotated tags; `None` if `id` is not a tag object.
async fn peel(storage: &dyn GitStorage, id: Hash) -> Result<Option<Hash>> {
    let mut current = id;
    let mut peeled = None;
    for _ in 0..MAX_PEEL_DEPTH {
        let object = match storage.object(&current, None).await {
            Ok(object) => object,
            Err(e) if e.is_not_found() => return Ok(peeled),
            Err(e) => return Err(e),
        };
        if object.kind() != ObjectKind::Tag {
            return Ok(peeled);
        }
        let (target, _) = parse_tag_target(object.data())?;
        peeled = Some(target);
        current = target;
    }
    Ok(peeled)
}

/// Builds the full smart-HTTP advertisement for `service`.
pub async fn advertise(storage: &dyn GitStorage, service: Service) -> Result<Bytes> {
    let refs = list_refs(storage).await?;
    let mut caps = service.capabilities();

    let mut w = PktWriter::new();
    w.text(&format!("# service={}", service.name()))?;
    w.flush();

    let mut first = true;
    if service == Service::UploadPack {
        match storage.resolve(HEAD).await {
            Ok(head) => {
                if let Some(target) = storage.head_target().await? {
                    caps.push(format!("symref={HEAD}:{target}"));
                }
                w.text(&ref_line(head, HEAD, Some(caps.as_slice())))?;
                first = false;
            },
            Err(e) if e.is_not_found() => debug!("HEAD is unborn"),
            Err(e) => return Err(e),
        }
    }

    for advertised in &refs {
        let caps = first.then_some(&caps);
        w.text(&ref_line(advertised.id, &advertised.name, caps.map(Vec::as_slice)))?;
        first = false;
        if let Some(peeled) = advertised.peeled {
            w.text(&ref_line(peeled, &format!("{}^{{}}", advertised.name), None))?;
        }
    }

    if first && service == Service::ReceivePack {
        w.text(&ref_line(hash::zero(), "capabilities^{}", Some(caps.as_slice())))?;
    }
    w.flush();
    Ok(w.freeze())
}

fn ref_line(id: Hash, name: &str, caps: Option<&[String]>) -> String {
    match caps {
        Some(caps) => format!("{id} {name}\0{}", caps.join(" ")),
        None => format!("{id} {name}"),
    }
}
