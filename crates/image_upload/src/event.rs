use crate::file::FileList;

/// Pointer position on the editing surface, in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coords {
    pub x: f32,
    pub y: f32,
}

impl Coords {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFlags {
    default_prevented: bool,
    propagation_stopped: bool,
}

impl EventFlags {
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

#[derive(Debug, Clone)]
pub struct DropEvent {
    files: FileList,
    coords: Coords,
    pub flags: EventFlags,
}

impl DropEvent {
    pub fn new(files: impl Into<FileList>, coords: Coords) -> Self {
        Self {
            files: files.into(),
            coords,
            flags: EventFlags::default(),
        }
    }

    pub fn files(&self) -> &FileList {
        &self.files
    }

    pub fn coords(&self) -> Coords {
        self.coords
    }
}

#[derive(Debug, Clone)]
pub struct PasteEvent {
    files: FileList,
    pub flags: EventFlags,
}

impl PasteEvent {
    pub fn new(files: impl Into<FileList>) -> Self {
        Self {
            files: files.into(),
            flags: EventFlags::default(),
        }
    }

    pub fn files(&self) -> &FileList {
        &self.files
    }
}
