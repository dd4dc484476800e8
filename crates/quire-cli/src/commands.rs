//! Subcommands.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Subcommand};

use quire_doc::{Document, LocalFile};
use quire_kernel::{DocumentPersistence, DocumentSession};
use quire_types::{
    BlockKind, BlockPatch, ContentBlock, DocumentKind, Protection, Recipient, RecipientChoice,
    RecipientId, SourceRef, is_valid_email, mime_for_filename,
};

use crate::app::{App, persist_edit, resolve_block};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a draft
    New {
        /// wall or agreement
        kind: DocumentKind,
        title: String,
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List stored documents
    List,

    /// Show a document and its blocks
    Show { doc: String },

    /// Append a block
    Add {
        doc: String,
        /// heading, paragraph, link, image, video, or file
        kind: BlockKind,
        #[command(flatten)]
        fields: BlockFields,
    },

    /// Edit a block's fields
    Update {
        doc: String,
        block: String,
        #[command(flatten)]
        fields: BlockFields,
    },

    /// Remove a block
    Remove { doc: String, block: String },

    /// Reorder blocks; list every block once, in the new order
    Reorder {
        doc: String,
        #[arg(required = true)]
        blocks: Vec<String>,
    },

    /// Attach a local file to an image, video, or file block and upload it
    Attach {
        doc: String,
        block: String,
        path: PathBuf,
    },

    /// Save as draft (unpublishes a published document)
    Save { doc: String },

    /// Publish
    Publish {
        doc: String,
        #[command(flatten)]
        protection: ProtectionArgs,
    },

    /// Send to a contact or email address
    Send {
        doc: String,
        /// Custom recipient email
        #[arg(long, conflicts_with = "contact")]
        to: Option<String>,
        /// Contact ID from `quire contact list`
        #[arg(long)]
        contact: Option<String>,
        #[command(flatten)]
        protection: ProtectionArgs,
    },

    /// Sign a sent agreement
    Sign { doc: String, name: String },

    /// Record that the recipient viewed a sent document
    View { doc: String },

    /// Manage contacts
    #[command(subcommand)]
    Contact(ContactCommand),
}

#[derive(Debug, Subcommand)]
pub enum ContactCommand {
    /// Add a contact
    Add { name: String, email: String },
    /// List contacts
    List,
}

#[derive(Debug, Default, Args)]
pub struct BlockFields {
    /// Heading text, paragraph body, link label, media caption, or file name
    #[arg(long)]
    text: Option<String>,
    /// Remote URL (links, media, files)
    #[arg(long)]
    url: Option<String>,
    /// Link description or file label
    #[arg(long)]
    caption: Option<String>,
    /// Heading level (1-3)
    #[arg(long)]
    level: Option<u8>,
}

impl BlockFields {
    fn into_patch(self) -> BlockPatch {
        let mut patch = match self.url {
            Some(url) => BlockPatch::url(url),
            None => BlockPatch::default(),
        };
        if let Some(text) = self.text {
            patch = patch.with_content(text);
        }
        if let Some(caption) = self.caption {
            patch = patch.with_caption(caption);
        }
        if let Some(level) = self.level {
            patch = patch.with_level(level);
        }
        patch
    }
}

#[derive(Debug, Default, Args)]
pub struct ProtectionArgs {
    /// Gate access behind a fresh random token
    #[arg(long, conflicts_with_all = ["open", "token"])]
    protect: bool,
    /// Remove token gating
    #[arg(long, conflicts_with = "token")]
    open: bool,
    /// Gate access behind this token
    #[arg(long)]
    token: Option<String>,
}

impl ProtectionArgs {
    fn into_protection(self) -> Protection {
        if self.protect {
            Protection::Protected
        } else if self.open {
            Protection::Open
        } else if let Some(token) = self.token {
            Protection::Token(token)
        } else {
            Protection::Unchanged
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn describe_source(block: &ContentBlock) -> String {
    match &block.source_ref {
        Some(SourceRef::Url(url)) => url.clone(),
        Some(SourceRef::Pending(h)) => format!("(pending {})", h.short()),
        None => "-".to_string(),
    }
}

fn render(doc: &Document, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "{}  {}  [{} / {}]", doc.id().short(), doc.title(), doc.kind(), doc.state())?;
    if !doc.description().is_empty() {
        writeln!(out, "  {}", doc.description())?;
    }
    if let Some(r) = doc.recipient() {
        writeln!(out, "  to: {}", r.email)?;
    }
    if let Some(token) = doc.protection_token() {
        writeln!(out, "  token: {token}")?;
    }
    if let Some(sig) = doc.signature() {
        writeln!(out, "  signed by: {}", sig.signer_name)?;
    }
    for block in doc.blocks() {
        let level = block.level.map(|l| format!(" h{l}")).unwrap_or_default();
        write!(out, "  {:>2} {} {}{}", block.position, block.id.short(), block.kind, level)?;
        if !block.content.is_empty() {
            write!(out, " {:?}", block.content)?;
        }
        if block.kind.has_source_mode() || block.kind == BlockKind::Link {
            write!(out, " {}", describe_source(block))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

// ============================================================================
// Dispatch
// ============================================================================

async fn edit<F>(app: &App, doc: &str, out: &mut dyn Write, f: F) -> Result<()>
where
    F: FnOnce(&mut DocumentSession) -> Result<()>,
{
    let mut session = app.session(doc).await?;
    f(&mut session)?;
    persist_edit(&mut session).await?;
    render(session.document(), out)
}

pub async fn run(app: &App, command: Command, out: &mut dyn Write) -> Result<()> {
    match command {
        Command::New {
            kind,
            title,
            description,
        } => {
            let mut session = DocumentSession::create(kind, title, app.collab());
            if let Some(description) = description {
                session.document_mut().set_description(description)?;
            }
            session.save_draft().await?;
            writeln!(out, "{}", session.document().id())?;
        }

        Command::List => {
            for doc in app.db().list_documents()? {
                writeln!(out, "{}  {:<10} {:<9} {}", doc.id.short(), doc.kind, doc.state, doc.title)?;
            }
        }

        Command::Show { doc } => {
            let id = app.resolve_document(&doc)?;
            let payload = app
                .db()
                .load_document(id)
                .await?
                .ok_or_else(|| anyhow!("document {id} not found"))?;
            render(&quire_doc::parse_document(&payload)?, out)?;
        }

        Command::Add { doc, kind, fields } => {
            edit(app, &doc, out, |s| {
                let block = s.document_mut().insert_block(kind)?;
                s.document_mut().update_block(&block.id, fields.into_patch())?;
                Ok(())
            })
            .await?;
        }

        Command::Update { doc, block, fields } => {
            edit(app, &doc, out, |s| {
                let id = resolve_block(s, &block)?;
                if !s.document_mut().update_block(&id, fields.into_patch())? {
                    bail!("block {block} not found");
                }
                Ok(())
            })
            .await?;
        }

        Command::Remove { doc, block } => {
            edit(app, &doc, out, |s| {
                let id = resolve_block(s, &block)?;
                s.document_mut()
                    .remove_block(&id)?
                    .ok_or_else(|| anyhow!("block {block} not found"))?;
                Ok(())
            })
            .await?;
        }

        Command::Reorder { doc, blocks } => {
            edit(app, &doc, out, |s| {
                let order = blocks
                    .iter()
                    .map(|b| resolve_block(s, b))
                    .collect::<Result<Vec<_>>>()?;
                s.document_mut().reorder(&order)?;
                Ok(())
            })
            .await?;
        }

        Command::Attach { doc, block, path } => {
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| anyhow!("{} has no file name", path.display()))?;
            let mime = mime_for_filename(&name)
                .ok_or_else(|| anyhow!("unsupported file type: {name}"))?;
            edit(app, &doc, out, |s| {
                let id = resolve_block(s, &block)?;
                s.document_mut().attach_file(&id, LocalFile::new(name, mime, data))?;
                Ok(())
            })
            .await?;
        }

        Command::Save { doc } => {
            let mut session = app.session(&doc).await?;
            session.save_draft().await?;
            render(session.document(), out)?;
        }

        Command::Publish { doc, protection } => {
            let mut session = app.session(&doc).await?;
            session.publish(protection.into_protection()).await?;
            render(session.document(), out)?;
        }

        Command::Send {
            doc,
            to,
            contact,
            protection,
        } => {
            let choice = match (to, contact) {
                (Some(email), _) => Some(RecipientChoice::Custom(email)),
                (None, Some(contact)) => Some(RecipientChoice::Contact(resolve_contact(app, &contact)?)),
                (None, None) => None,
            };
            let mut session = app.session(&doc).await?;
            session
                .send(choice.as_ref(), protection.into_protection())
                .await?;
            render(session.document(), out)?;
        }

        Command::Sign { doc, name } => {
            let mut session = app.session(&doc).await?;
            session.sign(name).await?;
            render(session.document(), out)?;
        }

        Command::View { doc } => {
            let mut session = app.session(&doc).await?;
            session.view().await?;
            render(session.document(), out)?;
        }

        Command::Contact(ContactCommand::Add { name, email }) => {
            let email = email.trim().to_string();
            if !is_valid_email(&email) {
                bail!("invalid email: {email}");
            }
            let contact = app.db().add_recipient(&Recipient::new(name, email))?;
            writeln!(out, "{}  {} <{}>", contact.id, contact.name, contact.email)?;
        }

        Command::Contact(ContactCommand::List) => {
            for contact in app.db().list_recipients()? {
                writeln!(out, "{}  {} <{}>", contact.id.short(), contact.name, contact.email)?;
            }
        }
    }
    Ok(())
}

fn resolve_contact(app: &App, query: &str) -> Result<RecipientId> {
    if let Ok(id) = RecipientId::parse(query) {
        return Ok(id);
    }
    let contacts = app.db().list_recipients()?;
    quire_types::resolve_prefix(
        contacts.iter().map(|c| c.id),
        &query.to_ascii_lowercase(),
        RecipientId::to_hex,
    )
    .ok_or_else(|| anyhow!("no unique contact matches {query:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_kernel::QuireConfig;
    use quire_types::LifecycleState;

    struct Fixture {
        dir: tempfile::TempDir,
        app: App,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let app = App::open(&QuireConfig::default(), dir.path()).unwrap();
        Fixture { dir, app }
    }

    async fn run_ok(app: &App, command: Command) -> String {
        let mut out = Vec::new();
        run(app, command, &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    async fn new_doc(app: &App, kind: DocumentKind, title: &str) -> String {
        run_ok(
            app,
            Command::New {
                kind,
                title: title.into(),
                description: Some("About".into()),
            },
        )
        .await
        .trim()
        .to_string()
    }

    #[test]
    fn test_protection_args() {
        assert_eq!(ProtectionArgs::default().into_protection(), Protection::Unchanged);
        let token = ProtectionArgs {
            token: Some("s3cret".into()),
            ..Default::default()
        };
        assert_eq!(token.into_protection(), Protection::Token("s3cret".into()));
    }

    #[test]
    fn test_block_fields_patch() {
        let patch = BlockFields {
            text: Some("Docs".into()),
            url: Some("https://example.com".into()),
            ..Default::default()
        }
        .into_patch();
        assert_eq!(patch.content.as_deref(), Some("Docs"));
        assert!(patch.source_ref.is_some());
        assert!(BlockFields::default().into_patch().is_empty());
    }

    #[tokio::test]
    async fn test_build_and_send_wall() {
        let f = fixture();
        let id = new_doc(&f.app, DocumentKind::Wall, "Launch").await;

        run_ok(
            &f.app,
            Command::Add {
                doc: id.clone(),
                kind: BlockKind::Heading,
                fields: BlockFields {
                    text: Some("Welcome".into()),
                    ..Default::default()
                },
            },
        )
        .await;

        let photo = f.dir.path().join("hero.png");
        std::fs::write(&photo, b"png bytes").unwrap();
        let shown = run_ok(
            &f.app,
            Command::Add {
                doc: id.clone(),
                kind: BlockKind::Image,
                fields: BlockFields::default(),
            },
        )
        .await;
        assert!(shown.contains("image"), "{shown}");

        let session = f.app.session(&id).await.unwrap();
        let image = session.document().blocks()[1].id.to_hex();
        run_ok(
            &f.app,
            Command::Attach {
                doc: id.clone(),
                block: image[..12].to_string(),
                path: photo,
            },
        )
        .await;

        let session = f.app.session(&id).await.unwrap();
        let url = session.document().blocks()[1].url().unwrap().to_string();
        assert!(url.starts_with("file://"), "{url}");

        run_ok(
            &f.app,
            Command::Send {
                doc: id.clone(),
                to: Some("guest@example.com".into()),
                contact: None,
                protection: ProtectionArgs::default(),
            },
        )
        .await;

        let session = f.app.session(&id).await.unwrap();
        assert_eq!(session.document().state(), LifecycleState::Sent);

        let mut out = Vec::new();
        let err = run(
            &f.app,
            Command::Remove {
                doc: id,
                block: image[..12].to_string(),
            },
            &mut out,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("sent"), "{err}");
    }

    #[tokio::test]
    async fn test_agreement_with_contact() {
        let f = fixture();
        let id = new_doc(&f.app, DocumentKind::Agreement, "NDA").await;
        run_ok(
            &f.app,
            Command::Contact(ContactCommand::Add {
                name: "Ada".into(),
                email: "ada@example.com".into(),
            }),
        )
        .await;
        let contact = f.app.db().list_recipients().unwrap()[0].id.short();

        run_ok(
            &f.app,
            Command::Send {
                doc: id.clone(),
                to: None,
                contact: Some(contact),
                protection: ProtectionArgs {
                    protect: true,
                    ..Default::default()
                },
            },
        )
        .await;
        run_ok(&f.app, Command::View { doc: id.clone() }).await;
        let shown = run_ok(&f.app, Command::Sign { doc: id.clone(), name: "Ada".into() }).await;
        assert!(shown.contains("signed by: Ada"), "{shown}");
        assert!(shown.contains("token: "), "{shown}");

        let listed = run_ok(&f.app, Command::List).await;
        assert!(listed.contains("signed"), "{listed}");
    }

    #[tokio::test]
    async fn test_reorder_requires_every_block() {
        let f = fixture();
        let id = new_doc(&f.app, DocumentKind::Wall, "Order").await;
        for text in ["One", "Two"] {
            run_ok(
                &f.app,
                Command::Add {
                    doc: id.clone(),
                    kind: BlockKind::Paragraph,
                    fields: BlockFields {
                        text: Some(text.into()),
                        ..Default::default()
                    },
                },
            )
            .await;
        }
        let session = f.app.session(&id).await.unwrap();
        let ids: Vec<String> = session.document().store().ids().iter().map(|b| b.to_hex()).collect();

        let mut out = Vec::new();
        let partial = run(
            &f.app,
            Command::Reorder {
                doc: id.clone(),
                blocks: vec![ids[1].clone()],
            },
            &mut out,
        )
        .await;
        assert!(partial.is_err());

        run_ok(
            &f.app,
            Command::Reorder {
                doc: id.clone(),
                blocks: vec![ids[1].clone(), ids[0].clone()],
            },
        )
        .await;
        let session = f.app.session(&id).await.unwrap();
        assert_eq!(session.document().blocks()[0].content, "Two");
    }

    #[tokio::test]
    async fn test_edit_published_wall_stays_published() {
        let f = fixture();
        let id = new_doc(&f.app, DocumentKind::Wall, "Launch").await;
        run_ok(
            &f.app,
            Command::Add {
                doc: id.clone(),
                kind: BlockKind::Heading,
                fields: BlockFields {
                    text: Some("Hi".into()),
                    ..Default::default()
                },
            },
        )
        .await;
        run_ok(
            &f.app,
            Command::Publish {
                doc: id.clone(),
                protection: ProtectionArgs::default(),
            },
        )
        .await;

        for kind in [BlockKind::Image, BlockKind::Paragraph] {
            run_ok(
                &f.app,
                Command::Add {
                    doc: id.clone(),
                    kind,
                    fields: BlockFields::default(),
                },
            )
            .await;
        }

        let session = f.app.session(&id).await.unwrap();
        assert_eq!(session.document().state(), LifecycleState::Published);
        let image = session.document().blocks()[1].id.to_hex();

        let logo = f.dir.path().join("logo.png");
        std::fs::write(&logo, b"logo bytes").unwrap();
        run_ok(
            &f.app,
            Command::Attach {
                doc: id.clone(),
                block: image,
                path: logo,
            },
        )
        .await;

        let session = f.app.session(&id).await.unwrap();
        let doc = session.document();
        assert_eq!(doc.state(), LifecycleState::Published);
        assert_eq!(doc.blocks().len(), 3);
        assert!(doc.blocks()[1].url().unwrap().starts_with("file://"));

        // Publishing again still requires complete blocks.
        let mut out = Vec::new();
        let err = run(
            &f.app,
            Command::Publish {
                doc: id,
                protection: ProtectionArgs::default(),
            },
            &mut out,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("paragraph"), "{err}");
    }
}
