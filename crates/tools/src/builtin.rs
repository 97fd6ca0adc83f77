//! Built-in editor tools, declared as a static table.
//!
//! Every entry forwards to the host method of the same name.  The host
//! owns the behavior; this table only supplies names, grouping and
//! parameter shapes for discovery and key normalization.

use crate::descriptor::ToolDescriptor;
use crate::registry::ToolRegistry;
use crate::schema::{ParamType, ParameterSchema};

use crate::schema::ParamType::{Array, Boolean, Integer, Number, Object, String as Str};

struct Param {
    name: &'static str,
    ty: ParamType,
    required: bool,
    description: &'static str,
}

struct BuiltinTool {
    name: &'static str,
    category: &'static str,
    description: &'static str,
    /// Reads, or writes that converge to the same state when repeated.
    idempotent: bool,
    params: &'static [Param],
}

const fn req(name: &'static str, ty: ParamType, description: &'static str) -> Param {
    Param {
        name,
        ty,
        required: true,
        description,
    }
}

const fn opt(name: &'static str, ty: ParamType, description: &'static str) -> Param {
    Param {
        name,
        ty,
        required: false,
        description,
    }
}

const TARGET: Param = req("target", Str, "Hierarchy path or instance id of the GameObject");

static BUILTIN_TOOLS: &[BuiltinTool] = &[
    // ── ui ───────────────────────────────────────────────────────────
    BuiltinTool {
        name: "create_ui_canvas",
        category: "ui",
        description: "Create a Canvas with an EventSystem",
        idempotent: false,
        params: &[
            opt("name", Str, "Canvas name"),
            opt("renderMode", Str, "screen_space_overlay, screen_space_camera or world_space"),
        ],
    },
    BuiltinTool {
        name: "create_ui_button",
        category: "ui",
        description: "Create a Button with a text label",
        idempotent: false,
        params: &[
            req("buttonText", Str, "Label shown on the button"),
            opt("parentPath", Str, "Canvas or panel to parent under"),
            opt("name", Str, "GameObject name"),
            opt("width", Number, "Width in pixels"),
            opt("height", Number, "Height in pixels"),
        ],
    },
    BuiltinTool {
        name: "create_ui_text",
        category: "ui",
        description: "Create a text element",
        idempotent: false,
        params: &[
            req("text", Str, "Text content"),
            opt("parentPath", Str, "Canvas or panel to parent under"),
            opt("fontSize", Integer, "Font size in points"),
            opt("color", Str, "Hex color, e.g. #FFFFFF"),
        ],
    },
    BuiltinTool {
        name: "create_ui_image",
        category: "ui",
        description: "Create an Image element",
        idempotent: false,
        params: &[
            opt("spritePath", Str, "Asset path of the sprite"),
            opt("parentPath", Str, "Canvas or panel to parent under"),
            opt("color", Str, "Tint as hex color"),
        ],
    },
    BuiltinTool {
        name: "set_ui_layout",
        category: "ui",
        description: "Set anchors, pivot and size of a RectTransform",
        idempotent: true,
        params: &[
            TARGET,
            opt("anchorMin", Array, "[x, y] in 0..1"),
            opt("anchorMax", Array, "[x, y] in 0..1"),
            opt("pivot", Array, "[x, y] in 0..1"),
            opt("sizeDelta", Array, "[width, height]"),
            opt("anchoredPosition", Array, "[x, y]"),
        ],
    },
    // ── gameobject ───────────────────────────────────────────────────
    BuiltinTool {
        name: "create_gameobject",
        category: "gameobject",
        description: "Create an empty or primitive GameObject",
        idempotent: false,
        params: &[
            req("name", Str, "GameObject name"),
            opt("primitiveType", Str, "cube, sphere, capsule, cylinder, plane or quad"),
            opt("parentPath", Str, "Parent in the hierarchy"),
            opt("position", Array, "[x, y, z]"),
        ],
    },
    BuiltinTool {
        name: "find_gameobject",
        category: "gameobject",
        description: "Find GameObjects by name, tag or path",
        idempotent: true,
        params: &[
            opt("name", Str, "Exact or partial name"),
            opt("tag", Str, "Tag filter"),
            opt("path", Str, "Hierarchy path"),
        ],
    },
    BuiltinTool {
        name: "delete_gameobject",
        category: "gameobject",
        description: "Delete a GameObject and its children",
        idempotent: false,
        params: &[TARGET],
    },
    BuiltinTool {
        name: "set_transform",
        category: "gameobject",
        description: "Set position, rotation and scale",
        idempotent: true,
        params: &[
            TARGET,
            opt("position", Array, "[x, y, z]"),
            opt("rotation", Array, "Euler angles [x, y, z]"),
            opt("scale", Array, "[x, y, z]"),
            opt("local", Boolean, "Use local space"),
        ],
    },
    BuiltinTool {
        name: "add_component",
        category: "gameobject",
        description: "Add a component by type name",
        idempotent: false,
        params: &[TARGET, req("componentType", Str, "Component type, e.g. Rigidbody")],
    },
    BuiltinTool {
        name: "get_component",
        category: "gameobject",
        description: "Read the serialized properties of a component",
        idempotent: true,
        params: &[TARGET, req("componentType", Str, "Component type")],
    },
    BuiltinTool {
        name: "set_component_property",
        category: "gameobject",
        description: "Set one serialized property on a component",
        idempotent: true,
        params: &[
            TARGET,
            req("componentType", Str, "Component type"),
            req("propertyName", Str, "Serialized property name"),
            req("value", Object, "New value"),
        ],
    },
    // ── material ─────────────────────────────────────────────────────
    BuiltinTool {
        name: "create_material",
        category: "material",
        description: "Create a material asset",
        idempotent: false,
        params: &[
            req("name", Str, "Material name"),
            opt("shader", Str, "Shader name"),
            opt("savePath", Str, "Asset folder"),
        ],
    },
    BuiltinTool {
        name: "set_material_property",
        category: "material",
        description: "Set a shader property on a material",
        idempotent: true,
        params: &[
            req("materialPath", Str, "Asset path of the material"),
            req("propertyName", Str, "Shader property, e.g. _Color"),
            req("value", Object, "Color, float, vector or texture path"),
        ],
    },
    BuiltinTool {
        name: "assign_material",
        category: "material",
        description: "Assign a material to a renderer",
        idempotent: true,
        params: &[
            TARGET,
            req("materialPath", Str, "Asset path of the material"),
            opt("slot", Integer, "Material slot index"),
        ],
    },
    BuiltinTool {
        name: "get_material_info",
        category: "material",
        description: "Read shader and properties of a material",
        idempotent: true,
        params: &[req("materialPath", Str, "Asset path of the material")],
    },
    // ── asset ────────────────────────────────────────────────────────
    BuiltinTool {
        name: "import_asset",
        category: "asset",
        description: "Copy a file into the project and import it",
        idempotent: false,
        params: &[
            req("sourcePath", Str, "File on disk"),
            req("destinationPath", Str, "Asset path to import to"),
        ],
    },
    BuiltinTool {
        name: "find_assets",
        category: "asset",
        description: "Search the asset database",
        idempotent: true,
        params: &[
            opt("filter", Str, "Search filter, e.g. t:Material"),
            opt("folder", Str, "Restrict to a folder"),
            opt("limit", Integer, "Maximum results"),
        ],
    },
    BuiltinTool {
        name: "create_prefab",
        category: "asset",
        description: "Save a GameObject as a prefab asset",
        idempotent: false,
        params: &[TARGET, req("savePath", Str, "Prefab asset path")],
    },
    BuiltinTool {
        name: "refresh_assets",
        category: "asset",
        description: "Refresh the asset database",
        idempotent: true,
        params: &[],
    },
    // ── scene ────────────────────────────────────────────────────────
    BuiltinTool {
        name: "get_scene_info",
        category: "scene",
        description: "Name, path and dirty state of the active scene",
        idempotent: true,
        params: &[opt("includeHierarchy", Boolean, "Include the root objects")],
    },
    BuiltinTool {
        name: "get_hierarchy",
        category: "scene",
        description: "The GameObject tree of the active scene",
        idempotent: true,
        params: &[
            opt("rootPath", Str, "Start from this object"),
            opt("maxDepth", Integer, "Depth limit"),
        ],
    },
    BuiltinTool {
        name: "open_scene",
        category: "scene",
        description: "Open a scene asset",
        idempotent: true,
        params: &[
            req("scenePath", Str, "Asset path of the scene"),
            opt("additive", Boolean, "Open additively"),
        ],
    },
    BuiltinTool {
        name: "save_scene",
        category: "scene",
        description: "Save the active scene",
        idempotent: true,
        params: &[opt("scenePath", Str, "Save as this path")],
    },
    // ── editor ───────────────────────────────────────────────────────
    BuiltinTool {
        name: "get_editor_state",
        category: "editor",
        description: "Play mode, compilation and selection state",
        idempotent: true,
        params: &[],
    },
    BuiltinTool {
        name: "enter_play_mode",
        category: "editor",
        description: "Enter play mode",
        idempotent: true,
        params: &[],
    },
    BuiltinTool {
        name: "exit_play_mode",
        category: "editor",
        description: "Exit play mode",
        idempotent: true,
        params: &[],
    },
    BuiltinTool {
        name: "execute_menu_item",
        category: "editor",
        description: "Run an editor menu command by path",
        idempotent: false,
        params: &[req("menuPath", Str, "e.g. GameObject/Align With View")],
    },
    BuiltinTool {
        name: "get_console_logs",
        category: "editor",
        description: "Recent console entries",
        idempotent: true,
        params: &[
            opt("logType", Str, "log, warning or error"),
            opt("limit", Integer, "Maximum entries"),
        ],
    },
];

fn descriptor(tool: &BuiltinTool) -> ToolDescriptor {
    let schema = tool
        .params
        .iter()
        .fold(ParameterSchema::new(), |schema, p| {
            schema.field(p.name, p.ty, p.required, p.description)
        });
    ToolDescriptor::new(tool.name, tool.category)
        .description(tool.description)
        .schema(schema)
        .idempotent(tool.idempotent)
}

/// Register every built-in tool.  Returns how many were registered.
pub fn register_builtin_tools(registry: &ToolRegistry) -> usize {
    for tool in BUILTIN_TOOLS {
        registry.register(descriptor(tool));
    }
    tracing::debug!(count = BUILTIN_TOOLS.len(), "registered built-in tools");
    BUILTIN_TOOLS.len()
}
