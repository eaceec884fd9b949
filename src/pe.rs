use std::path::Path;

use goblin::pe::PE;
use tracing::debug;

use crate::binary::VersionRecord;
use crate::clr;
use crate::error::ReadError;
use crate::version_info::{self, VersionStrings};

pub struct PeAnalyzer<'a> {
    path: &'a Path,
    data: &'a [u8],
    pe: PE<'a>,
}

impl<'a> PeAnalyzer<'a> {
    pub fn new(path: &'a Path, data: &'a [u8]) -> Result<Self, ReadError> {
        let pe = PE::parse(data)?;
        Ok(Self { path, data, pe })
    }

    pub fn analyze(&self) -> Result<VersionRecord, ReadError> {
        let name = match self.assembly_name()? {
            Some(name) => name,
            None => self.file_stem(),
        };
        let versions = self.version_strings()?;

        debug!(
            path = %self.path.display(),
            name = %name,
            managed = self.clr_header().is_some(),
            "read module metadata"
        );

        Ok(VersionRecord {
            name,
            file_version: versions.file_version,
            product_version: versions.product_version,
        })
    }

    fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn version_strings(&self) -> Result<VersionStrings, ReadError> {
        let Some((rva, size)) = self.resource_table() else {
            return Ok(VersionStrings::default());
        };
        let resources = self.slice_at_rva(rva, size)?;

        match version_info::find_version_resource(resources)? {
            Some((blob_rva, blob_size)) => {
                let blob = self.slice_at_rva(blob_rva, blob_size)?;
                version_info::parse_version_info(blob)
            }
            None => Ok(VersionStrings::default()),
        }
    }

    fn assembly_name(&self) -> Result<Option<String>, ReadError> {
        let Some((rva, size)) = self.clr_header() else {
            return Ok(None);
        };
        let header = self.slice_at_rva(rva, size)?;
        let (metadata_rva, metadata_size) = clr::metadata_directory(header)?;
        let metadata = self.slice_at_rva(metadata_rva, metadata_size)?;
        clr::assembly_name(metadata)
    }

    fn resource_table(&self) -> Option<(u32, u32)> {
        let optional = self.pe.header.optional_header.as_ref()?;
        optional
            .data_directories
            .get_resource_table()
            .as_ref()
            .filter(|dir| dir.virtual_address != 0 && dir.size != 0)
            .map(|dir| (dir.virtual_address, dir.size))
    }

    fn clr_header(&self) -> Option<(u32, u32)> {
        let optional = self.pe.header.optional_header.as_ref()?;
        optional
            .data_directories
            .get_clr_runtime_header()
            .as_ref()
            .filter(|dir| dir.virtual_address != 0 && dir.size != 0)
            .map(|dir| (dir.virtual_address, dir.size))
    }

    fn rva_to_offset(&self, rva: u32) -> Option<usize> {
        for section in &self.pe.sections {
            let start = section.virtual_address;
            let span = section.virtual_size.max(section.size_of_raw_data);
            if rva >= start && rva - start < span {
                let offset = (rva - start) as usize + section.pointer_to_raw_data as usize;
                return Some(offset);
            }
        }

        // RVAs below the first section map 1:1 onto the headers
        let size_of_headers = self
            .pe
            .header
            .optional_header
            .as_ref()
            .map(|opt| opt.windows_fields.size_of_headers)
            .unwrap_or(0);
        (rva < size_of_headers).then_some(rva as usize)
    }

    /// Bytes backing `size` bytes at `rva`, truncated to what the file holds.
    fn slice_at_rva(&self, rva: u32, size: u32) -> Result<&'a [u8], ReadError> {
        let offset = self.rva_to_offset(rva).ok_or(ReadError::BadRva(rva))?;
        if offset >= self.data.len() {
            return Err(ReadError::BadRva(rva));
        }
        let end = offset.saturating_add(size as usize).min(self.data.len());
        Ok(&self.data[offset..end])
    }
}
