use tracing::debug;

use super::handles::{FileHandle, OpenMode};
use super::FileSystem;
use crate::error::{FsError, Result};
use crate::graph::variant::Args;
use crate::graph::{Method, NodeId, Variant};

impl Method {
    /// Structural methods answer with a leading success flag, `false` on failure.
    pub fn reports_success(self) -> bool {
        matches!(
            self,
            Method::CreateDirectory | Method::CreateFile | Method::Delete | Method::MoveOrCopy
        )
    }
}

fn handle_arg(args: &Args<'_>, index: usize) -> Result<FileHandle> {
    let raw = args.unsigned(index)?;
    u32::try_from(raw)
        .map(FileHandle)
        .map_err(|_| FsError::InvalidArgument(format!("file handle {} out of range", raw)))
}

impl FileSystem {
    /// Invoke `method` on `node` with positional `args`.
    pub fn call(&self, node: NodeId, method: &str, args: &[Variant]) -> Result<Vec<Variant>> {
        let not_registered = || FsError::MethodNotFound {
            node,
            method: method.to_string(),
        };
        let method: Method = method.parse().map_err(|_| not_registered())?;
        if !self.space.has_method(node, method) {
            if !self.space.contains(node) {
                return Err(FsError::NotFound(format!("node {}", node)));
            }
            return Err(not_registered());
        }
        debug!("call(node={}, method={}, args={})", node, method.name(), args.len());

        let args = Args::new(method.name(), args);
        let outputs = match method {
            Method::Open => {
                let code = args.unsigned(0)?;
                let mode = u32::try_from(code)
                    .map_err(|_| FsError::InvalidMode(code))
                    .and_then(OpenMode::try_from)?;
                let handle = self.open(node, mode)?;
                vec![Variant::UInt32(handle.0)]
            }
            Method::Close => {
                self.close(node, handle_arg(&args, 0)?);
                Vec::new()
            }
            Method::Read => {
                let handle = handle_arg(&args, 0)?;
                let data = self.read(node, handle, args.int32(1)?)?;
                vec![Variant::ByteString(data)]
            }
            Method::Write => {
                let handle = handle_arg(&args, 0)?;
                self.write(node, handle, args.bytes(1)?)?;
                Vec::new()
            }
            Method::SetPosition => {
                let handle = handle_arg(&args, 0)?;
                let ok = self.set_position(node, handle, args.unsigned(1)?);
                vec![Variant::Boolean(ok)]
            }
            Method::GetPosition => {
                let handle = handle_arg(&args, 0)?;
                vec![Variant::UInt64(self.get_position(node, handle)?)]
            }
            Method::CreateDirectory => {
                let created = self.create_directory(node, args.string(0)?)?;
                vec![Variant::Boolean(true), Variant::NodeId(created)]
            }
            Method::CreateFile => {
                // The open-on-create flag is optional on the wire.
                let request_open = if args.len() > 1 { args.boolean(1)? } else { false };
                let (created, code) = self.create_file(node, args.string(0)?, request_open)?;
                vec![
                    Variant::Boolean(true),
                    Variant::UInt32(code),
                    Variant::NodeId(created),
                ]
            }
            Method::Delete => {
                self.delete(node, args.string(0)?)?;
                vec![Variant::Boolean(true)]
            }
            Method::MoveOrCopy => {
                let target =
                    self.move_or_copy(node, args.string(0)?, args.string(1)?, args.boolean(2)?)?;
                vec![Variant::Boolean(true), Variant::NodeId(target)]
            }
        };
        Ok(outputs)
    }
}
