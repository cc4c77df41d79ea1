//! 控制器注册表：请求类名称到所属控制器的确定性解析
//!
//! Controller registry: an ordered table of controllers and the request classes
//! they own. Short names resolve to the first controller (in registration
//! order) that owns them, so new controllers are appended and never change how
//! existing names resolve.

use crate::schema::{Predicate, PredicateType};
use crate::{Error, Result};
use std::sync::Arc;

/// Where a request class's predicate schema comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaSource {
    /// Fetched from `{controller}/modeldef/class/{class}`.
    Remote,
    /// Known up front; the class has no modeldef endpoint.
    Offline(Vec<Predicate>),
}

/// Static description of one request class within one controller.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestClassDescriptor {
    pub name: String,
    pub controller: String,
    pub schema: SchemaSource,
    /// Payload is binary; the body is never decoded as text.
    pub binary: bool,
    /// Sent as multipart POST with a `file` part.
    pub upload: bool,
    /// Keywords sent as URL query parameters instead of path segments.
    pub param_fields: Vec<String>,
    pub deprecated: bool,
}

impl RequestClassDescriptor {
    pub fn remote(controller: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            controller: controller.into(),
            schema: SchemaSource::Remote,
            binary: false,
            upload: false,
            param_fields: Vec::new(),
            deprecated: false,
        }
    }

    pub fn offline<I, S>(controller: impl Into<String>, name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let predicates = fields
            .into_iter()
            .map(|f| Predicate::new(f, PredicateType::String).nullable(true))
            .collect();
        Self {
            schema: SchemaSource::Offline(predicates),
            ..Self::remote(controller, name)
        }
    }

    pub fn binary(mut self) -> Self {
        self.binary = true;
        self
    }

    pub fn upload(mut self) -> Self {
        self.upload = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    pub fn with_param_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.param_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// `controller.class`, unique within a registry.
    pub fn key(&self) -> String {
        format!("{}.{}", self.controller, self.name)
    }

    pub fn needs_remote_schema(&self) -> bool {
        matches!(self.schema, SchemaSource::Remote)
    }

    pub fn supports_line_streaming(&self) -> bool {
        !self.binary
    }
}

#[derive(Debug, Clone)]
pub struct Controller {
    pub id: String,
    classes: Vec<Arc<RequestClassDescriptor>>,
}

impl Controller {
    pub fn get(&self, class: &str) -> Option<&Arc<RequestClassDescriptor>> {
        self.classes.iter().find(|d| d.name == class)
    }

    pub fn classes(&self) -> impl Iterator<Item = &Arc<RequestClassDescriptor>> {
        self.classes.iter()
    }
}

/// Ordered controller table. First registered wins on ambiguous names.
#[derive(Debug, Clone, Default)]
pub struct ControllerRegistry {
    controllers: Vec<Controller>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The Space-Track controllers, in lookup priority order.
    pub fn spacetrack() -> Self {
        const BASIC: &str = "basicspacedata";
        const EXPANDED: &str = "expandedspacedata";
        const FILESHARE: &str = "fileshare";
        const SPEPHEMERIS: &str = "spephemeris";
        const PUBLICFILES: &str = "publicfiles";

        let basic = [
            "announcement", "boxscore", "cdm_public", "decay", "gp", "gp_history",
            "launch_site", "omm", "satcat", "satcat_change", "satcat_debut", "tip",
            "tle", "tle_latest", "tle_publish",
        ]
        .into_iter()
        .map(|name| {
            let d = RequestClassDescriptor::remote(BASIC, name);
            if matches!(name, "tle" | "tle_latest" | "tle_publish" | "omm") {
                d.deprecated()
            } else {
                d
            }
        });

        let expanded = [
            "car", "cdm", "maneuver", "maneuver_history", "organization", "satellite",
        ]
        .into_iter()
        .map(|name| RequestClassDescriptor::remote(EXPANDED, name));

        let fileshare = vec![
            RequestClassDescriptor::remote(FILESHARE, "delete"),
            RequestClassDescriptor::offline(FILESHARE, "download", ["file_id", "folder_id", "recursive"])
                .binary(),
            RequestClassDescriptor::remote(FILESHARE, "file"),
            RequestClassDescriptor::remote(FILESHARE, "folder"),
            RequestClassDescriptor::offline(FILESHARE, "upload", ["folder_id", "file"]).upload(),
        ];

        let spephemeris = vec![
            RequestClassDescriptor::offline(SPEPHEMERIS, "download", Vec::<String>::new()).binary(),
            RequestClassDescriptor::remote(SPEPHEMERIS, "file"),
            RequestClassDescriptor::remote(SPEPHEMERIS, "file_history"),
        ];

        let publicfiles = vec![
            RequestClassDescriptor::offline(PUBLICFILES, "dirs", Vec::<String>::new()),
            RequestClassDescriptor::offline(PUBLICFILES, "download", Vec::<String>::new())
                .binary()
                .with_param_fields(["name"]),
        ];

        Self::new()
            .with_controller(BASIC, basic)
            .with_controller(EXPANDED, expanded)
            .with_controller(FILESHARE, fileshare)
            .with_controller(SPEPHEMERIS, spephemeris)
            .with_controller(PUBLICFILES, publicfiles)
    }

    /// Append classes to `id`, creating the controller at the end if needed.
    pub fn with_controller<I>(mut self, id: &str, classes: I) -> Self
    where
        I: IntoIterator<Item = RequestClassDescriptor>,
    {
        let idx = match self.controllers.iter().position(|c| c.id == id) {
            Some(idx) => idx,
            None => {
                self.controllers.push(Controller {
                    id: id.to_string(),
                    classes: Vec::new(),
                });
                self.controllers.len() - 1
            }
        };
        let controller = &mut self.controllers[idx];
        for mut class in classes {
            class.controller = id.to_string();
            match controller.classes.iter().position(|c| c.name == class.name) {
                Some(pos) => controller.classes[pos] = Arc::new(class),
                None => controller.classes.push(Arc::new(class)),
            }
        }
        self
    }

    pub fn controller(&self, id: &str) -> Option<&Controller> {
        self.controllers.iter().find(|c| c.id == id)
    }

    pub fn controllers(&self) -> impl Iterator<Item = &Controller> {
        self.controllers.iter()
    }

    /// Resolve a request class, optionally pinned to a controller.
    pub fn resolve(&self, class: &str, controller: Option<&str>) -> Result<Arc<RequestClassDescriptor>> {
        match controller {
            Some(id) => {
                let c = self.controller(id).ok_or_else(|| Error::UnknownController {
                    controller: id.to_string(),
                })?;
                c.get(class).cloned().ok_or_else(|| Error::UnknownRequestClass {
                    class: class.to_string(),
                    controller: id.to_string(),
                })
            }
            None => self
                .controllers
                .iter()
                .find_map(|c| c.get(class).cloned())
                .ok_or_else(|| Error::AmbiguousOrUnknownRequestClass {
                    class: class.to_string(),
                }),
        }
    }

    /// All distinct request class names, sorted.
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .controllers
            .iter()
            .flat_map(|c| c.classes.iter().map(|d| d.name.clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }
}
